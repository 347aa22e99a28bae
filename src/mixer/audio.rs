use crate::clip::ClipDescriptor;
use crate::foundation::buffer::AudioBlock;
use crate::foundation::core::secs_to_samples;

/// Sums the audio of every active descriptor into one block.
#[derive(Debug)]
pub struct AudioMixer {
    sample_rate: u32,
    channels: u16,
    scratch: AudioBlock,
}

impl AudioMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            scratch: AudioBlock::silent(channels, 0),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_offset(&self, secs: f64, frames: usize) -> usize {
        secs_to_samples(secs, self.sample_rate).clamp(0, frames as i64) as usize
    }

    /// Mix the block of `out.frames()` frames starting at timeline time `position`.
    ///
    /// Each audible descriptor contributes only to the samples inside its `[start, end)`.
    /// Clips are re-seeked when their read position drifts by more than half a sample from
    /// the source time the block needs. The sum is clamped to `[-1, 1]`.
    pub fn mix(&mut self, descriptors: &mut [ClipDescriptor], position: f64, out: &mut AudioBlock) {
        out.clear();
        let frames = out.frames();
        if frames == 0 {
            return;
        }
        let ch = usize::from(out.channels());
        let rate = f64::from(self.sample_rate);
        let block_end = position + frames as f64 / rate;

        for d in descriptors.iter_mut() {
            if !d.audio_playing || d.end <= position || d.start >= block_end {
                continue;
            }
            if !d.clip.info().has_audio {
                continue;
            }
            let first = self.sample_offset(d.start - position, frames);
            let last = self.sample_offset(d.end - position, frames);
            if first >= last {
                continue;
            }
            let count = last - first;
            let seg_start = position + first as f64 / rate;
            let src_t = d.source_time(seg_start);
            if (d.clip.next_read_position() - src_t).abs() > 0.5 / rate {
                tracing::trace!(
                    descriptor = d.id.0,
                    from = d.clip.next_read_position(),
                    to = src_t,
                    "re-seeking clip"
                );
                d.clip.set_next_read_position(src_t);
            }

            self.scratch.reset(out.channels(), count);
            d.clip.read_next_audio_block(&mut self.scratch);

            let local = d.local_time(seg_start);
            for p in d.audio_processors.iter_mut() {
                p.prepare_audio(self.sample_rate, out.channels(), frames);
                p.process_audio(local, &mut self.scratch);
            }

            let v0 = d.volume.value_at(local) as f32;
            let v1 = d.volume.value_at(local + count as f64 / rate) as f32;
            let step = (v1 - v0) / count as f32;
            let dst = &mut out.samples_mut()[first * ch..last * ch];
            for (i, (o, s)) in dst
                .chunks_exact_mut(ch)
                .zip(self.scratch.samples().chunks_exact(ch))
                .enumerate()
            {
                let gain = v0 + step * i as f32;
                for (o, s) in o.iter_mut().zip(s) {
                    *o += s * gain;
                }
            }
        }

        for s in out.samples_mut() {
            *s = s.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mixer/audio.rs"]
mod tests;
