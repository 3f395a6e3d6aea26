pub mod writer_json;

pub use writer_json::append_status_jsonl;
pub use writer_json::ensure_dir;
pub use writer_json::write_result;
