//! Server-rendered HTML for the form front door.

use crate::queue::{JobSnapshot, JobState};

const STYLE: &str = "body{font-family:sans-serif;max-width:40rem;margin:3rem auto;padding:0 1rem}\
textarea{width:100%;min-height:8rem}button{margin-top:.5rem}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

pub fn index(default_language: &str) -> String {
    layout(
        "voxrelay",
        &format!(
            "<h1>Text to speech</h1>\n\
<form method=\"post\" action=\"/\">\n\
<textarea name=\"text\" required placeholder=\"Type something to say\"></textarea>\n\
<label>Language <input name=\"language\" value=\"{lang}\" size=\"6\"></label>\n\
<button type=\"submit\">Queue</button>\n\
<button type=\"submit\" formaction=\"/synthesize\">Speak now</button>\n\
</form>",
            lang = escape_html(default_language),
        ),
    )
}

pub fn submitted(snapshot: &JobSnapshot) -> String {
    let id = snapshot.id;
    layout(
        "Job queued",
        &format!(
            "<h1>Job queued</h1>\n<p>Job <code>{id}</code> is {state}.</p>\n\
<p><a href=\"/jobs/{id}\">Check status</a></p>\n<p><a href=\"/\">Submit another</a></p>",
            state = snapshot.state,
        ),
    )
}

pub fn job_status(snapshot: &JobSnapshot) -> String {
    let id = snapshot.id;
    let detail = match (snapshot.state, snapshot.artifact.as_deref()) {
        (JobState::Succeeded, Some(artifact)) => format!(
            "<p><audio controls src=\"/download/{artifact}\"></audio></p>\n\
<p><a href=\"/download/{artifact}\" download=\"speech_output.wav\">Download audio</a></p>",
            artifact = escape_html(artifact),
        ),
        (JobState::DeadLettered, _) => format!(
            "<p>Synthesis failed after {} attempt(s): {}</p>",
            snapshot.attempts,
            escape_html(snapshot.error.as_deref().unwrap_or("unknown error")),
        ),
        (JobState::Cancelled, _) => "<p>The job was cancelled.</p>".to_string(),
        _ => format!(
            "<p>Still working (attempt {}). This page refreshes automatically.</p>",
            snapshot.attempts
        ),
    };
    let refresh = if snapshot.state.is_terminal() {
        ""
    } else {
        "<meta http-equiv=\"refresh\" content=\"2\">\n"
    };
    layout(
        "Job status",
        &format!(
            "{refresh}<h1>Job <code>{id}</code></h1>\n<p>Status: <strong>{state}</strong></p>\n{detail}\n\
<p><a href=\"/\">Back</a></p>",
            state = snapshot.state,
        ),
    )
}

pub fn not_found(what: &str) -> String {
    layout(
        "Not found",
        &format!(
            "<h1>Not found</h1>\n<p>{} does not exist.</p>\n<p><a href=\"/\">Back</a></p>",
            escape_html(what)
        ),
    )
}

pub fn error(message: &str) -> String {
    layout(
        "Error",
        &format!(
            "<h1>Something went wrong</h1>\n<p>{}</p>\n<p><a href=\"/\">Back</a></p>",
            escape_html(message)
        ),
    )
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
