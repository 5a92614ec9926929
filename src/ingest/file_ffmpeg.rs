//! Local file frame source using FFmpeg.
//!
//! Decodes the best video stream of a local file to RGB24 in-memory. The
//! scaler writes into a reused FFmpeg frame; pixels are copied out into a
//! fresh `Frame` before they leave this module.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use crate::frame::{Frame, StreamInfo};

pub(crate) struct FfmpegFileSource {
    path: String,
    input: ffmpeg::format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::codec::decoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    info: StreamInfo,
    frame_count: u64,
    eof_sent: bool,
    last_error: Option<String>,
}

impl FfmpegFileSource {
    pub(crate) fn open(path: &str) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        let input = ffmpeg::format::input(&path)
            .with_context(|| format!("failed to open file input '{}' with ffmpeg", path))?;
        let input_stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| anyhow!("file has no video track"))?;
        let stream_index = input_stream.index();
        let rate = input_stream.avg_frame_rate();
        let context = ffmpeg::codec::context::Context::from_parameters(input_stream.parameters())
            .context("load video decoder parameters")?;
        let decoder = context
            .decoder()
            .video()
            .context("open ffmpeg video decoder")?;

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::util::format::pixel::Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        let fps = if rate.denominator() != 0 && rate.numerator() > 0 {
            f64::from(rate)
        } else {
            log::warn!("FileSource: {} reports no frame rate, assuming 30", path);
            30.0
        };
        let info = StreamInfo {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            codec: decoder.id().name().to_string(),
        };
        log::info!(
            "FileSource: opened {} (ffmpeg, {}x{} @ {:.2} fps, codec {})",
            path,
            info.width,
            info.height,
            info.fps,
            info.codec
        );

        Ok(Self {
            path: path.to_string(),
            input,
            stream_index,
            decoder,
            scaler,
            info,
            frame_count: 0,
            eof_sent: false,
            last_error: None,
        })
    }

    pub(crate) fn info(&self) -> StreamInfo {
        self.info.clone()
    }

    pub(crate) fn read_next(&mut self) -> Result<Option<Frame>> {
        let result = self.decode_next();
        if let Err(err) = &result {
            self.last_error = Some(format!("{:#}", err));
        }
        result
    }

    pub(crate) fn frames_read(&self) -> u64 {
        self.frame_count
    }

    pub(crate) fn is_healthy(&self) -> bool {
        self.last_error.is_none()
    }

    fn decode_next(&mut self) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.receive_decoded()? {
                return Ok(Some(frame));
            }
            if self.eof_sent {
                log::debug!(
                    "FileSource: {} drained after {} frames",
                    self.path,
                    self.frame_count
                );
                return Ok(None);
            }
            match self.next_video_packet() {
                Some(packet) => self
                    .decoder
                    .send_packet(&packet)
                    .context("send packet to ffmpeg decoder")?,
                None => {
                    self.decoder
                        .send_eof()
                        .context("flush ffmpeg decoder")?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn next_video_packet(&mut self) -> Option<ffmpeg::Packet> {
        let stream_index = self.stream_index;
        self.input
            .packets()
            .find(|(stream, _)| stream.index() == stream_index)
            .map(|(_, packet)| packet)
    }

    fn receive_decoded(&mut self) -> Result<Option<Frame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(err) if is_drained(&err) => return Ok(None),
            Err(err) => {
                return Err(anyhow::Error::new(err).context("receive frame from ffmpeg decoder"))
            }
        }
        let mut rgb_frame = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&decoded, &mut rgb_frame)
            .context("scale frame to RGB")?;
        let (pixels, width, height) = frame_to_pixels(&rgb_frame)?;
        self.frame_count += 1;
        Ok(Some(Frame::from_rgb(pixels, width, height)?))
    }
}

/// True for the codec's "nothing more right now" answers: EAGAIN (feed more
/// input) and EOF (fully flushed). Anything else is a real failure.
pub(crate) fn is_drained(err: &ffmpeg::Error) -> bool {
    matches!(
        err,
        ffmpeg::Error::Eof
            | ffmpeg::Error::Other {
                errno: ffmpeg::util::error::EAGAIN
            }
    )
}

/// Copy an RGB24 FFmpeg frame into a tightly packed buffer, dropping row padding.
fn frame_to_pixels(frame: &ffmpeg::frame::Video) -> Result<(Vec<u8>, u32, u32)> {
    let width = frame.width();
    let height = frame.height();
    let row_bytes = (width as usize) * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    if stride == row_bytes {
        let len = row_bytes * height as usize;
        let pixels = data
            .get(..len)
            .context("ffmpeg frame is shorter than its dimensions")?;
        return Ok((pixels.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("ffmpeg frame row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
