pub mod core {
    pub mod car;
    pub mod handle_feed;
    pub mod interpolator;
    pub mod render_driver;
    pub mod sample_buffer;
    pub mod segments;
    pub mod smoother;
    pub mod track;
    pub mod track_path;
}
pub mod interfaces {
    pub mod gui_interface;
    pub mod telemetry;
}
pub mod pre {
    pub mod live_opts;
    pub mod read_live_pars;
}
