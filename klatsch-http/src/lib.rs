mod backend;
pub use backend::HttpBackend;

mod refresh;
pub use refresh::AutoRefresh;
