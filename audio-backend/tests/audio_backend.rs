#![cfg(feature = "mock-audio")]

use std::sync::Arc;
use audio_backend::{create_audio_backend, AudioBackend};
use audio_backend::mock_backend::MockAudioBackend;

#[test]
fn mock_backend_reports_device_info() {
    let backend = create_audio_backend().expect("create backend");
    assert!(backend.sample_rate() > 0);
    assert!(backend.channels() > 0);
    let provider = backend.as_device_info_provider().expect("device info provider");
    assert_eq!(provider.get_device_name(), Some("mock-device"));
}

#[test]
fn mock_backend_renders_registered_callback() {
    let mut backend = MockAudioBackend::new();
    let render: audio_backend::RenderFn = Arc::new(|buf: &mut [i16]| {
        buf.iter_mut().for_each(|s| *s = 1000);
    });
    backend.start(render).expect("start");

    let out = backend.render_once(64);
    assert_eq!(out.len(), 64 * backend.channels() as usize);
    assert!(out.iter().all(|&s| s == 1000));
    assert!(backend.frames_since_start() >= 64);

    backend.stop().expect("stop");
    let silence = backend.render_once(16);
    assert!(silence.iter().all(|&s| s == 0));
}
