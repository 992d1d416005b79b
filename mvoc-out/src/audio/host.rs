//! Host audio output using cpal
//!
//! Presents the host's output device as a hardware channel with blocking
//! submission. Submitted units are volume-scaled and pushed into a lock-free
//! SPSC ring; the cpal callback drains the ring and plays silence on
//! underrun. `output_blocking` waits while the ring has no room for a whole
//! unit, which paces the pump to the device.
//!
//! `cpal::Stream` is not `Send` on every host, so the stream lives on its own
//! thread for the lifetime of the channel.

use crate::audio::platform::{OutputChannel, Platform, PlatformError};
use crate::audio::types::PanVolume;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, StreamConfig};
use mvoc_common::NativeFormat;
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Units of headroom kept in the ring between pump and device callback
const RING_UNITS: usize = 2;

/// Platform backed by the host's audio device
#[derive(Debug, Default)]
pub struct HostPlatform {
    device_name: Option<String>,
}

impl HostPlatform {
    /// Use the named output device, or the default device when `None`
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }

    /// Names of the host's output devices
    pub fn list_devices() -> Result<Vec<String>, PlatformError> {
        let host = cpal::default_host();
        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| PlatformError::new(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();
        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }
}

impl Platform for HostPlatform {
    fn reserve_channel(
        &self,
        frames: usize,
        format: NativeFormat,
    ) -> Result<Arc<dyn OutputChannel>, PlatformError> {
        let channel = HostChannel::open(self.device_name.clone(), frames, format)?;
        Ok(Arc::new(channel))
    }
}

struct Feed {
    producer: HeapProd<i16>,
    scratch: Vec<i16>,
}

struct HostChannel {
    feed: Mutex<Feed>,
    poll_interval: Duration,
    shutdown: Mutex<Option<mpsc::Sender<()>>>,
    stream_thread: Mutex<Option<JoinHandle<()>>>,
}

impl HostChannel {
    fn open(
        device_name: Option<String>,
        frames: usize,
        format: NativeFormat,
    ) -> Result<Self, PlatformError> {
        let unit = format.samples_per(frames);
        let (producer, consumer) = HeapRb::<i16>::new(unit * RING_UNITS).split();

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<String, PlatformError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let stream_thread = std::thread::Builder::new()
            .name("host_audio".to_string())
            .spawn(move || {
                let stream = match open_stream(device_name.as_deref(), format, consumer) {
                    Ok((stream, name)) => {
                        let _ = ready_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the channel is released
                let _ = shutdown_rx.recv();
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause host stream: {}", e);
                }
                drop(stream);
            })
            .map_err(|e| PlatformError::new(format!("Failed to spawn host audio thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(name)) => info!("Host audio channel open on {}", name),
            Ok(Err(e)) => {
                let _ = stream_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stream_thread.join();
                return Err(PlatformError::new("host audio thread exited during setup"));
            }
        }

        Ok(Self {
            feed: Mutex::new(Feed {
                producer,
                scratch: Vec::with_capacity(unit),
            }),
            poll_interval: Duration::from_nanos(format.frames_to_nanos(frames) / 4),
            shutdown: Mutex::new(Some(shutdown_tx)),
            stream_thread: Mutex::new(Some(stream_thread)),
        })
    }
}

impl OutputChannel for HostChannel {
    fn output_blocking(&self, volume: PanVolume, samples: &[i16]) {
        let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        let Feed { producer, scratch } = &mut *feed;

        scratch.clear();
        scratch.extend_from_slice(samples);
        for frame in scratch.chunks_exact_mut(2) {
            volume.apply(frame);
        }

        let mut offset = 0;
        while offset < scratch.len() {
            offset += producer.push_slice(&scratch[offset..]);
            if offset < scratch.len() {
                std::thread::sleep(self.poll_interval);
            }
        }
    }
}

impl Drop for HostChannel {
    fn drop(&mut self) {
        if let Some(tx) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(());
        }
        if let Some(handle) = self
            .stream_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            if handle.join().is_err() {
                error!("Host audio thread panicked");
            }
        }
        debug!("Released host audio channel");
    }
}

fn find_device(device_name: Option<&str>) -> Result<Device, PlatformError> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| PlatformError::new(format!("Failed to enumerate devices: {}", e)))?;
        match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
            Some(device) => return Ok(device),
            None => warn!("Requested device '{}' not found, falling back to default device", name),
        }
    }

    host.default_output_device()
        .ok_or_else(|| PlatformError::new("No default output device found"))
}

/// Pick a native-rate stereo config, preferring i16 then f32
fn native_config(
    device: &Device,
    format: NativeFormat,
) -> Result<(StreamConfig, SampleFormat), PlatformError> {
    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| PlatformError::new(format!("Failed to get device configs: {}", e)))?
        .filter(|c| {
            c.channels() == format.channels
                && c.min_sample_rate().0 <= format.sample_rate
                && c.max_sample_rate().0 >= format.sample_rate
        })
        .collect();

    for wanted in [SampleFormat::I16, SampleFormat::F32] {
        if let Some(config) = configs.iter().find(|c| c.sample_format() == wanted) {
            let config = config
                .clone()
                .with_sample_rate(cpal::SampleRate(format.sample_rate))
                .config();
            return Ok((config, wanted));
        }
    }

    Err(PlatformError::new(format!(
        "Device has no {} Hz {}-channel i16/f32 output",
        format.sample_rate, format.channels
    )))
}

fn open_stream(
    device_name: Option<&str>,
    format: NativeFormat,
    mut consumer: HeapCons<i16>,
) -> Result<(cpal::Stream, String), PlatformError> {
    let device = find_device(device_name)?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let (config, sample_format) = native_config(&device, format)?;
    debug!(
        "Host audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let on_error = |err: cpal::StreamError| error!("Host audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::I16 => device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let read = consumer.pop_slice(data);
                data[read..].fill(0);
            },
            on_error,
            None,
        ),
        _ => device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = consumer
                        .try_pop()
                        .map_or(0.0, |s| s as f32 / i16::MAX as f32);
                }
            },
            on_error,
            None,
        ),
    }
    .map_err(|e| PlatformError::new(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| PlatformError::new(format!("Failed to start stream: {}", e)))?;

    Ok((stream, name))
}
