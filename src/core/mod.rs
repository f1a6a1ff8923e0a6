pub mod disclosure;
pub mod export;
pub mod feedback;
pub mod lexicon;
pub mod matcher;
pub mod responses;
pub mod scenario;
pub mod session;
pub mod speech;
pub mod template;
