use super::types::SynthesisRequest;

pub(super) fn build_synthesis_multipart(boundary: &str, request: &SynthesisRequest) -> Vec<u8> {
    let voice = request.voice.bytes();
    let mut body = Vec::with_capacity(voice.len() + 1024);

    append_field(&mut body, boundary, "text", request.text.trim());
    append_field(&mut body, boundary, "language", &request.language);
    append_field(&mut body, boundary, "device", &request.device.to_string());
    append_field(
        &mut body,
        boundary,
        "sample_rate",
        &request.sample_rate.to_string(),
    );

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"speaker_wav\"; filename=\"{}\"\r\n",
            request.voice.file_name().replace('"', "")
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
    body.extend_from_slice(voice);
    body.extend_from_slice(b"\r\n");
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    body
}

fn append_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

pub(super) fn trim_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

pub(super) fn is_wav_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .map(str::trim)
        .unwrap_or_default();

    matches!(
        mime,
        "audio/wav" | "audio/x-wav" | "audio/wave" | "application/octet-stream"
    )
}

/// RIFF/WAVE container magic.
pub(super) fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}
