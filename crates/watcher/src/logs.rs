//! 로그 스트림 디멀티플렉싱 -- Docker 다중화 프레이밍 해제
//!
//! TTY 없이 생성된 컨테이너의 로그를 Docker 데몬은 stdout/stderr가
//! 하나로 다중화된 프레임 스트림으로 반환합니다. 각 프레임은 8바이트
//! 헤더(스트림 선택자 1바이트, 패딩 3바이트, big-endian 페이로드 길이
//! 4바이트) 뒤에 페이로드가 이어지는 구조입니다.
//!
//! [`MultiplexedLogCodec`]은 이 프레이밍을 tokio-util [`Decoder`]로
//! 해제합니다. 프레임은 전송 청크 경계와 무관하게 버퍼에 누적된 만큼만
//! 디코딩되므로, 임의 지점에서 쪼개진 입력도 동일한 결과를 냅니다.
//! [`collect_tail`]은 원시 청크 채널을 끝까지 소모해 순서가 보존된
//! 평문 텍스트로 합칩니다.

use bytes::{Buf, Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio_util::codec::Decoder;

use crate::error::WatcherError;

/// 프레임 헤더 크기 (선택자 1 + 패딩 3 + 길이 4)
const FRAME_HEADER_LEN: usize = 8;

/// 단일 프레임 페이로드 상한. 초과 선언은 손상된 프레이밍으로 간주합니다.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// 프레임의 원본 스트림 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl LogStreamKind {
    fn from_selector(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// 디코딩된 로그 프레임 한 건
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    /// 원본 스트림
    pub stream: LogStreamKind,
    /// 페이로드 바이트 (헤더 제외)
    pub payload: Bytes,
}

/// Docker 다중화 로그 프레이밍 디코더
#[derive(Debug, Default)]
pub struct MultiplexedLogCodec;

impl MultiplexedLogCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for MultiplexedLogCodec {
    type Item = LogFrame;
    type Error = WatcherError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogFrame>, WatcherError> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let selector = src[0];
        let stream = LogStreamKind::from_selector(selector).ok_or_else(|| {
            WatcherError::LogDecode(format!("unknown stream selector byte {selector:#04x}"))
        })?;

        let payload_len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if payload_len > MAX_FRAME_LEN {
            return Err(WatcherError::LogDecode(format!(
                "frame length {payload_len} exceeds limit {MAX_FRAME_LEN}"
            )));
        }

        if src.len() < FRAME_HEADER_LEN + payload_len {
            // 페이로드가 아직 도착하지 않음
            src.reserve(FRAME_HEADER_LEN + payload_len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(LogFrame { stream, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogFrame>, WatcherError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(WatcherError::LogDecode(format!(
                "truncated trailing frame ({} bytes left in buffer)",
                src.len()
            ))),
        }
    }
}

/// 원시 로그 청크 채널을 끝까지 소모해 평문 텍스트로 합칩니다.
///
/// 프레임 순서(= 데몬이 기록한 인터리빙 순서)가 그대로 유지되고
/// 헤더 바이트는 결과에 포함되지 않습니다. 페이로드는 lossy UTF-8로
/// 변환되어 잘못된 바이트는 U+FFFD로 치환됩니다.
///
/// 채널이 전송 에러를 실어 보내면 그대로 전파하고, 스트림이 프레임
/// 중간에서 끊기면 [`WatcherError::LogDecode`]를 반환합니다.
pub async fn collect_tail(
    mut chunks: mpsc::Receiver<Result<Bytes, WatcherError>>,
) -> Result<String, WatcherError> {
    let mut codec = MultiplexedLogCodec::new();
    let mut buffer = BytesMut::new();
    let mut text = String::new();

    while let Some(chunk) = chunks.recv().await {
        buffer.extend_from_slice(&chunk?);
        while let Some(frame) = codec.decode(&mut buffer)? {
            text.push_str(&String::from_utf8_lossy(&frame.payload));
        }
    }

    // 스트림 종료 후 잔여 바이트 검사
    while let Some(frame) = codec.decode_eof(&mut buffer)? {
        text.push_str(&String::from_utf8_lossy(&frame.payload));
    }

    Ok(text)
}

/// 테스트용 프레임 인코더
#[cfg(test)]
pub(crate) fn encode_frame(selector: u8, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.push(selector);
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}
