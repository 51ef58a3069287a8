pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    Overrides, apply_overrides, build_source, expand_path, handle_rank, handle_user, load_fixture,
    write_report,
};
