//! Scene types: camera and camera controllers.

pub mod camera;
pub mod controller;

pub use camera::{Camera, Projection};
pub use controller::{
    ArcballController, CameraController, ControllerButton, FlightController, MoveKey,
    OrthoController,
};
