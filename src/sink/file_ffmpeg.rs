//! Local file sink using FFmpeg.
//!
//! Encodes RGB24 frames to YUV420P with the configured codec, the source's
//! codec, or MPEG-4 as a last resort. The container is picked by FFmpeg from
//! the file extension.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;
use ffmpeg::util::format::pixel::Pixel;

use super::{check_dimensions, VideoSink};
use crate::frame::{SequencedFrame, StreamInfo};
use crate::ingest::file_ffmpeg::is_drained;

pub(crate) struct FfmpegFileSink {
    path: String,
    info: StreamInfo,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::codec::encoder::video::Encoder,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    frames: u64,
    finished: bool,
}

impl FfmpegFileSink {
    pub(crate) fn create(path: &str, codec: Option<&str>, info: &StreamInfo) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("failed to open file output '{}' with ffmpeg", path))?;
        let codec_name = codec.unwrap_or(&info.codec);
        let codec = select_encoder(codec_name)?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::flag::Flags::GLOBAL_HEADER);

        let fps = info.fps_rounded() as i32;
        let encoder_time_base = ffmpeg::Rational::new(1, fps);

        let mut stream = output.add_stream(codec).context("add output video stream")?;
        let stream_index = stream.index();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .context("create ffmpeg video encoder")?;
        encoder.set_width(info.width);
        encoder.set_height(info.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(encoder_time_base);
        encoder.set_frame_rate(Some(ffmpeg::Rational::new(fps, 1)));
        if global_header {
            encoder.set_flags(ffmpeg::codec::flag::Flags::GLOBAL_HEADER);
        }
        let encoder = encoder
            .open_as(codec)
            .with_context(|| format!("open encoder '{}'", codec.name()))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .with_context(|| format!("write container header to {}", path))?;
        let stream_time_base = output
            .stream(stream_index)
            .map(|s| s.time_base())
            .ok_or_else(|| anyhow!("output stream {} disappeared", stream_index))?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            Pixel::RGB24,
            info.width,
            info.height,
            Pixel::YUV420P,
            info.width,
            info.height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "FileSink: writing {}x{} @ {} fps to {} (ffmpeg, encoder {})",
            info.width,
            info.height,
            fps,
            path,
            codec.name()
        );

        Ok(Self {
            path: path.to_string(),
            info: info.clone(),
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            frames: 0,
            finished: false,
        })
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        loop {
            match self.encoder.receive_packet(&mut packet) {
                Ok(()) => {}
                Err(err) if is_drained(&err) => return Ok(()),
                Err(err) => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("receive packet from encoder for {}", self.path)))
                }
            }
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .with_context(|| format!("write packet to {}", self.path))?;
        }
    }
}

impl VideoSink for FfmpegFileSink {
    fn write(&mut self, frame: &SequencedFrame) -> Result<()> {
        if self.finished {
            return Err(anyhow!("{} already finished", self.path));
        }
        check_dimensions(frame, &self.info)?;

        let width = self.info.width;
        let height = self.info.height;
        let row_bytes = width as usize * 3;
        let mut rgb = ffmpeg::frame::Video::new(Pixel::RGB24, width, height);
        let stride = rgb.stride(0);
        let src = frame.frame.pixels();
        let dst = rgb.data_mut(0);
        for row in 0..height as usize {
            let from = &src[row * row_bytes..(row + 1) * row_bytes];
            dst.get_mut(row * stride..row * stride + row_bytes)
                .context("ffmpeg frame row is out of bounds")?
                .copy_from_slice(from);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.frames as i64));
        self.encoder
            .send_frame(&yuv)
            .with_context(|| format!("encode frame {}", frame.index))?;
        self.drain_packets()?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.encoder.send_eof().context("flush ffmpeg encoder")?;
        self.drain_packets()?;
        self.output
            .write_trailer()
            .with_context(|| format!("write container trailer to {}", self.path))?;
        log::info!("FileSink: {} closed after {} frames", self.path, self.frames);
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn is_healthy(&self) -> bool {
        !self.finished
    }
}

fn select_encoder(name: &str) -> Result<ffmpeg::Codec> {
    if let Some(codec) = ffmpeg::encoder::find_by_name(name) {
        return Ok(codec);
    }
    let id = match name {
        "h264" | "avc1" => Some(ffmpeg::codec::Id::H264),
        "hevc" | "h265" | "hvc1" => Some(ffmpeg::codec::Id::HEVC),
        "vp8" => Some(ffmpeg::codec::Id::VP8),
        "vp9" => Some(ffmpeg::codec::Id::VP9),
        "mjpeg" => Some(ffmpeg::codec::Id::MJPEG),
        _ => None,
    };
    if let Some(codec) = id.and_then(ffmpeg::encoder::find) {
        return Ok(codec);
    }
    log::warn!("FileSink: no encoder for '{}', falling back to mpeg4", name);
    ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
        .ok_or_else(|| anyhow!("no usable video encoder (wanted '{}', mpeg4 unavailable)", name))
}
