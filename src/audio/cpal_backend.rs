use crate::audio::{AudioBackend, SharedSynth};
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, Stream};
use std::sync::PoisonError;
use tracing::{error, info, warn};

/// Output through the platform's default audio device.
pub struct CpalBackend {
    stream: Option<Stream>,
    suspended: bool,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            stream: None,
            suspended: false,
        }
    }

    fn select_output_device(host: &cpal::Host) -> Result<cpal::Device, AudioError> {
        if let Some(device) = host.default_output_device() {
            return Ok(device);
        }
        if cfg!(target_os = "linux") {
            return Self::select_linux_output_device(host);
        }
        Err(AudioError::NoOutputDevice)
    }

    /// Some Linux setups report no default; fall back to a PipeWire or `default:` device.
    fn select_linux_output_device(host: &cpal::Host) -> Result<cpal::Device, AudioError> {
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Device(e.to_string()))?;

        for device in devices {
            let name = device.name().unwrap_or_default().to_lowercase();
            if name.starts_with("default:") || name.contains("pipewire") {
                return Ok(device);
            }
        }
        Err(AudioError::NoOutputDevice)
    }

    fn build_stream(synth: SharedSynth) -> Result<Stream, AudioError> {
        let host = cpal::default_host();
        let device = Self::select_output_device(&host)?;
        info!("Selected output device: {}", device.name().unwrap_or_default());

        let supported_config = device
            .default_output_config()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        let sample_format = supported_config.sample_format();
        let stream_config: cpal::StreamConfig = supported_config.into();

        match sample_format {
            SampleFormat::F32 => Self::build_typed_stream::<f32>(&device, &stream_config, synth),
            SampleFormat::I16 => Self::build_typed_stream::<i16>(&device, &stream_config, synth),
            SampleFormat::U16 => Self::build_typed_stream::<u16>(&device, &stream_config, synth),
            other => Err(AudioError::UnsupportedSampleFormat(format!("{:?}", other))),
        }
    }

    fn build_typed_stream<T>(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        synth: SharedSynth,
    ) -> Result<Stream, AudioError>
    where
        T: SizedSample + Sample + FromSample<f32>,
    {
        let sample_rate = config.sample_rate.0 as f32;
        let channels = config.channels as usize;
        let mut mono: Vec<f32> = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    mono.resize(data.len() / channels, 0.0);
                    {
                        let mut synth = synth.lock().unwrap_or_else(PoisonError::into_inner);
                        synth.process(&mut mono, sample_rate);
                    }
                    for (frame, sample) in data.chunks_mut(channels).zip(mono.iter()) {
                        let value = T::from_sample(*sample);
                        frame.iter_mut().for_each(|out| *out = value);
                    }
                },
                |err| error!("Stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;

        info!("Output stream: {} Hz, {} channels", sample_rate, channels);
        Ok(stream)
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    fn start(&mut self, synth: SharedSynth) -> Result<(), AudioError> {
        let stream = Self::build_stream(synth)?;
        // A stream that refuses to play is kept and reported as suspended
        self.suspended = match stream.play() {
            Ok(()) => false,
            Err(e) => {
                warn!("Output stream did not start, staying suspended: {}", e);
                true
            }
        };
        self.stream = Some(stream);
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotStarted)?;
        stream
            .pause()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        self.suspended = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NotStarted)?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;
        self.suspended = false;
        Ok(())
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!("Failed to pause stream on stop: {}", e);
            }
        }
        self.suspended = false;
    }
}
