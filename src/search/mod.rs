pub mod context;
pub mod dedup;
pub mod describe;
pub mod keywords;
pub mod ranker;
pub mod resolver;
pub mod similarity;
