use helpers::geometry::{Point2d, Vector2d};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// CarTransform is what the draw pass reads for one car. Only the render driver writes to it.
///
/// * `pos` - (m) Rendered position on the centerline
/// * `heading` - Unit direction of travel
/// * `progress` - Rendered lap fraction the position was computed from
/// * `written` - False until the render driver wrote a position for the first time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CarTransform {
    pub pos: Point2d,
    pub heading: Vector2d,
    pub progress: f64,
    pub written: bool,
}

pub type RenderTarget = Rc<RefCell<CarTransform>>;

/// CarInfo contains the static information the view shows next to a car.
#[derive(Debug, Clone, Default)]
pub struct CarInfo {
    pub car_no: u32,
    pub initials: String,
    pub color: RgbColor,
}
