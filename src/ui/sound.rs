/// Sound engine: procedural chip-style sound effects via rodio.
///
/// Every effect is synthesized into an in-memory WAV buffer at init time
/// and played fire-and-forget through a detached sink. Building without
/// the "sound" feature swaps in a no-op engine.

#[cfg(feature = "sound")]
mod inner {
    use std::io::Cursor;
    use std::sync::Arc;

    use rodio::{OutputStream, OutputStreamHandle, Sink};

    const SAMPLE_RATE: u32 = 22050;
    const TAU: f32 = 2.0 * std::f32::consts::PI;

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        sfx_jump: Arc<Vec<u8>>,
        sfx_push: Arc<Vec<u8>>,
        sfx_land: Arc<Vec<u8>>,
        sfx_drop: Arc<Vec<u8>>,
        sfx_smash: Arc<Vec<u8>>,
        sfx_score: Arc<Vec<u8>>,
        sfx_game_over: Arc<Vec<u8>>,
    }

    impl SoundEngine {
        pub fn new() -> Option<Self> {
            let (stream, handle) = OutputStream::try_default().ok()?;
            Some(SoundEngine {
                _stream: stream,
                handle,
                sfx_jump: Arc::new(make_wav(&gen_jump())),
                sfx_push: Arc::new(make_wav(&gen_push())),
                sfx_land: Arc::new(make_wav(&gen_land())),
                sfx_drop: Arc::new(make_wav(&gen_drop())),
                sfx_smash: Arc::new(make_wav(&gen_smash())),
                sfx_score: Arc::new(make_wav(&gen_score())),
                sfx_game_over: Arc::new(make_wav(&gen_game_over())),
            })
        }

        fn play(&self, buf: &Arc<Vec<u8>>) {
            if let Ok(sink) = Sink::try_new(&self.handle) {
                let cursor = Cursor::new(buf.as_ref().clone());
                if let Ok(src) = rodio::Decoder::new(cursor) {
                    sink.append(src);
                    sink.detach();
                }
            }
        }

        pub fn play_jump(&self) {
            self.play(&self.sfx_jump);
        }
        pub fn play_push(&self) {
            self.play(&self.sfx_push);
        }
        pub fn play_land(&self) {
            self.play(&self.sfx_land);
        }
        pub fn play_drop(&self) {
            self.play(&self.sfx_drop);
        }
        pub fn play_smash(&self) {
            self.play(&self.sfx_smash);
        }
        pub fn play_score(&self) {
            self.play(&self.sfx_score);
        }
        pub fn play_game_over(&self) {
            self.play(&self.sfx_game_over);
        }
    }

    // ── Waveform generators (mono f32 samples) ──

    fn sweep(from: f32, to: f32, duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut phase = 0.0f32;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                let freq = from + (to - from) * t;
                phase += freq * TAU / SAMPLE_RATE as f32;
                let env = (1.0 - t).powf(0.7);
                phase.sin() * env * volume
            })
            .collect()
    }

    fn tones(notes: &[f32], note_dur: f32, volume: f32) -> Vec<f32> {
        let mut samples = Vec::new();
        for &freq in notes {
            let n = (SAMPLE_RATE as f32 * note_dur) as usize;
            for i in 0..n {
                let t = i as f32 / SAMPLE_RATE as f32;
                let env = 1.0 - (i as f32 / n as f32).powf(0.5);
                // A dash of second harmonic keeps it from sounding flat.
                let wave = (t * freq * TAU).sin() * 0.7 + (t * freq * 2.0 * TAU).sin() * 0.3;
                samples.push(wave * env * volume);
            }
        }
        samples
    }

    fn noise_burst(duration: f32, volume: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * duration) as usize;
        let mut state: u32 = 0x2F6E_2B1;
        (0..n)
            .map(|i| {
                let t = i as f32 / n as f32;
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let noise = (state >> 16) as f32 / 32_768.0 - 1.0;
                noise * (1.0 - t).powf(1.2) * volume
            })
            .collect()
    }

    /// Jump: quick upward chirp.
    fn gen_jump() -> Vec<f32> {
        sweep(300.0, 900.0, 0.09, 0.25)
    }

    /// Push: short low scrape.
    fn gen_push() -> Vec<f32> {
        let mut s = noise_burst(0.07, 0.18);
        let tone = sweep(160.0, 120.0, 0.07, 0.2);
        for (a, b) in s.iter_mut().zip(tone) {
            *a += b;
        }
        s
    }

    /// Landing: dull thud.
    fn gen_land() -> Vec<f32> {
        sweep(220.0, 90.0, 0.08, 0.3)
    }

    /// Crate released from a crane: small descending blip.
    fn gen_drop() -> Vec<f32> {
        sweep(700.0, 400.0, 0.06, 0.2)
    }

    /// Crate smashing: noise with a falling edge.
    fn gen_smash() -> Vec<f32> {
        let mut s = noise_burst(0.16, 0.35);
        let tone = sweep(500.0, 80.0, 0.16, 0.2);
        for (a, b) in s.iter_mut().zip(tone) {
            *a += b;
        }
        s
    }

    /// Row cleared: rising three-note jingle.
    fn gen_score() -> Vec<f32> {
        tones(&[659.0, 880.0, 1175.0], 0.09, 0.3)
    }

    /// Game over: slow falling minor line.
    fn gen_game_over() -> Vec<f32> {
        let mut samples = tones(&[494.0, 440.0, 392.0, 330.0], 0.16, 0.3);
        let fade = samples.len() / 3;
        let total = samples.len();
        for i in (total - fade)..total {
            samples[i] *= (total - i) as f32 / fade as f32;
        }
        samples
    }

    // ── WAV encoding (16-bit PCM mono) ──

    fn make_wav(samples: &[f32]) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let byte_rate = SAMPLE_RATE * u32::from(bits_per_sample) / 8;
        let data_size = samples.len() as u32 * 2;

        let mut buf = Vec::with_capacity(44 + data_size as usize);
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&(36 + data_size).to_le_bytes());
        buf.extend_from_slice(b"WAVE");

        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
        buf.extend_from_slice(&1u16.to_le_bytes()); // mono
        buf.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes()); // block align
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());

        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            let val = (s.clamp(-1.0, 1.0) * 32_767.0) as i16;
            buf.extend_from_slice(&val.to_le_bytes());
        }
        buf
    }
}

// ── Public API; compiles to no-ops without the "sound" feature ──

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

#[cfg(not(feature = "sound"))]
pub struct SoundEngine;

#[cfg(not(feature = "sound"))]
impl SoundEngine {
    pub fn new() -> Option<Self> {
        Some(SoundEngine)
    }
    pub fn play_jump(&self) {}
    pub fn play_push(&self) {}
    pub fn play_land(&self) {}
    pub fn play_drop(&self) {}
    pub fn play_smash(&self) {}
    pub fn play_score(&self) {}
    pub fn play_game_over(&self) {}
}
