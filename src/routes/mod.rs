pub mod files;
pub mod upload;

pub use files::get_file;
pub use upload::upload;

pub async fn health() -> &'static str {
    "OK"
}
