//! Still capture through an external command (`libcamera-still` by default).
//!
//! The command writes one encoded image to stdout. It is killed if it runs
//! past the configured timeout.

use super::sysfs::{PinMode, SysfsPin};
use crate::marker::locate_qr;
use cardfeed_common::hal::config::{CameraConfig, HardwareConfig};
use cardfeed_common::hal::driver::{CaptureDevice, HalError};
use cardfeed_common::hal::types::{DynamicImage, MarkerLocation};
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WAIT_POLL: Duration = Duration::from_millis(10);

/// External-command camera with a GPIO illumination LED.
#[derive(Debug)]
pub struct CommandCamera {
    config: CameraConfig,
    led: Option<SysfsPin>,
}

impl CommandCamera {
    /// Camera with the LED on `hw.pins.led`.
    pub fn open(hw: &HardwareConfig) -> Result<Self, HalError> {
        let led = SysfsPin::open(&hw.sysfs_root, hw.gpio_base, hw.pins.led, PinMode::OutputLow)?;
        Ok(Self {
            config: hw.camera.clone(),
            led: Some(led),
        })
    }

    /// Camera without illumination control.
    pub fn without_led(config: CameraConfig) -> Self {
        Self { config, led: None }
    }

    fn run_command(&self) -> Result<Vec<u8>, HalError> {
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                HalError::CaptureFailed(format!("cannot start {}: {}", self.config.command, e))
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_with_deadline(&mut child, self.config.timeout())?;
        let output = collect(stdout)?;

        if !status.success() {
            let stderr = collect(stderr).unwrap_or_default();
            return Err(HalError::CaptureFailed(format!(
                "{} exited with {}: {}",
                self.config.command,
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(output)
    }
}

type Drain = thread::JoinHandle<std::io::Result<Vec<u8>>>;

/// Read a child pipe to the end on a helper thread so neither pipe can fill up.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Drain> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).map(|_| buf)
        })
    })
}

fn collect(drain: Option<Drain>) -> Result<Vec<u8>, HalError> {
    let handle = drain.ok_or_else(|| HalError::CaptureFailed("pipe not captured".to_string()))?;
    handle
        .join()
        .map_err(|_| HalError::CaptureFailed("pipe reader panicked".to_string()))?
        .map_err(|e| HalError::CaptureFailed(format!("reading pipe: {e}")))
}

/// Wait for `child`, killing it once `timeout` has passed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> Result<std::process::ExitStatus, HalError> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(HalError::CaptureFailed(format!(
                    "capture timed out after {:?}",
                    timeout
                )));
            }
            Ok(None) => thread::sleep(WAIT_POLL),
            Err(e) => return Err(HalError::CaptureFailed(format!("wait failed: {e}"))),
        }
    }
}

impl CaptureDevice for CommandCamera {
    fn capture_still(&mut self) -> Result<DynamicImage, HalError> {
        let start = Instant::now();
        let bytes = self.run_command()?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| HalError::CaptureFailed(format!("decoding {} bytes: {e}", bytes.len())))?;
        debug!(
            "Captured {}x{} in {:?}",
            image.width(),
            image.height(),
            start.elapsed()
        );
        Ok(image)
    }

    fn locate_marker(&self, region: &DynamicImage) -> Option<MarkerLocation> {
        locate_qr(region)
    }

    fn set_illumination(&mut self, on: bool) -> Result<(), HalError> {
        match self.led.as_mut() {
            Some(led) => led.write(on),
            None => Ok(()),
        }
    }
}

impl Drop for CommandCamera {
    fn drop(&mut self) {
        if let Some(led) = self.led.as_mut() {
            if let Err(e) = led.write(false) {
                warn!("Failed to switch off illumination: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn sh(script: &str, timeout_s: f64) -> CameraConfig {
        CameraConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout_s,
        }
    }

    #[test]
    fn decodes_command_output() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("frame.png");
        let mut png = Vec::new();
        RgbImage::new(8, 6)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        std::fs::write(&path, png).unwrap();

        let mut camera =
            CommandCamera::without_led(sh(&format!("cat {}", path.display()), 5.0));
        let image = camera.capture_still().unwrap();
        assert_eq!((image.width(), image.height()), (8, 6));
    }

    #[test]
    fn failing_command_is_capture_failure() {
        let mut camera = CommandCamera::without_led(sh("echo no camera >&2; exit 3", 5.0));
        let err = camera.capture_still().unwrap_err();
        assert!(err.to_string().contains("no camera"));
    }

    #[test]
    fn garbage_output_is_capture_failure() {
        let mut camera = CommandCamera::without_led(sh("echo not-an-image", 5.0));
        assert!(matches!(
            camera.capture_still(),
            Err(HalError::CaptureFailed(_))
        ));
    }

    #[test]
    fn hung_command_is_killed() {
        let mut camera = CommandCamera::without_led(sh("exec sleep 5", 0.2));
        let start = Instant::now();
        let err = camera.capture_still().unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn missing_command_is_capture_failure() {
        let mut camera = CommandCamera::without_led(CameraConfig {
            command: "/nonexistent/camera".to_string(),
            ..CameraConfig::default()
        });
        assert!(matches!(
            camera.capture_still(),
            Err(HalError::CaptureFailed(_))
        ));
    }
}
