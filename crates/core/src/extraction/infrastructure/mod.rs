pub mod directory_upload_sink;
pub mod image_codec;
pub mod region_extractor;
pub mod temp_dir_storage;
