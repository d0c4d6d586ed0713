/// Linear interpolation from `a` toward `b` by fraction `t`.
///
/// Called once per frame with the scroll ease factor, which gives the
/// exponential smoothing of the carousel.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
