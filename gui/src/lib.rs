pub mod core {
    pub mod gui;
}
pub mod interfaces {
    pub mod feed_interface;
}
