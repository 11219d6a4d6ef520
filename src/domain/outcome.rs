/// Three-way classification of a gateway response, used identically by the
/// webhook path and the poll path so both resolve a payment the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Indeterminate,
}

/// Normalize a gateway (status, response code) pair.
///
/// Success wins when either signal says so; an unrecognized non-empty code
/// is a failure, but an absent code alone is not. The asymmetry is how the
/// gateway actually behaves in practice.
pub fn classify(status: Option<&str>, response_code: Option<&str>) -> Outcome {
    let status_upper = status.map(str::to_uppercase);
    let code = response_code.filter(|c| !c.is_empty());

    if matches!(status_upper.as_deref(), Some("COMPLETED") | Some("SUCCESS"))
        || matches!(code, Some("200") | Some("0"))
    {
        return Outcome::Success;
    }

    if matches!(status_upper.as_deref(), Some("FAILED") | Some("CANCELLED")) {
        return Outcome::Failure;
    }
    if let Some(code) = code {
        if code != "200" && code != "0" && code != "PENDING" {
            return Outcome::Failure;
        }
    }

    Outcome::Indeterminate
}
