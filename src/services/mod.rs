pub mod key_builder;
pub mod local_scan;
pub mod metadata_cache;
pub mod reconciler;
pub mod remote_store;
pub mod s3_store;
pub mod upload_decision;
pub mod uploader;
