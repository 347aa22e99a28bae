//! Audio summing and software video compositing over a descriptor list.

pub mod audio;
pub mod composite;
pub mod video;

pub use audio::AudioMixer;
pub use video::SoftwareVideoMixer;
