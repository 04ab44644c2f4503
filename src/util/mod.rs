pub mod html;
pub mod newsapi;
pub mod summarizer;
