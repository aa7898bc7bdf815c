pub mod canvas_overlay_surface;
pub mod render_context;
