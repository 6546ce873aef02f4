pub mod cache;
#[cfg(feature = "dispatch")]
pub mod dispatch;
pub mod lhtss;
pub mod paint_mixing;
pub mod perceptual;
pub mod pigment;
pub mod worker;
