use crate::types::{JobOutcome, JobRecord};

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

pub fn format_outcome_readable(outcome: &JobOutcome) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", outcome.title));
    output.push_str(&format!(
        "**Job:** {} | **Status:** {}\n\n",
        outcome.job_id,
        outcome.status.as_str()
    ));
    output.push_str(outcome.result_text.trim());
    output.push('\n');
    output
}

pub fn format_record_readable(record: &JobRecord) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", record.title));
    output.push_str(&format!(
        "**Job:** {} | **Status:** {} | **Requester:** {}\n",
        record.id,
        record.status.as_str(),
        record.requester_id
    ));
    output.push_str(&format!("**Source:** {}\n\n", record.source_url));

    match &record.result {
        Some(text) => {
            output.push_str(text.trim());
            output.push('\n');
        }
        None => output.push_str("_No summary yet._\n"),
    }

    output
}
