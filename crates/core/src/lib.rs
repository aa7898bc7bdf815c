pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_analyzer;
    }
    pub mod infrastructure;
}

pub mod extraction {
    pub mod domain {
        pub mod crop_region;
        pub mod crop_storage;
        pub mod upload_sink;
    }
    pub mod infrastructure;
}

pub mod overlay {
    pub mod domain {
        pub mod overlay_mapper;
        pub mod overlay_surface;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod capture_faces_use_case;
    pub mod pipeline_logger;
    pub mod preview_loop;
}

pub mod shared {
    pub mod bounding_box;
    pub mod cancellation;
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod pixel_format;
}
