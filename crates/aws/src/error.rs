//! Classification of AWS error responses into [`CloudError`].

use cloudpilot_core::CloudError;

use crate::xml;

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthFailure",
    "UnrecognizedClientException",
    "InvalidClientTokenId",
    "ExpiredToken",
    "ExpiredTokenException",
    "SignatureDoesNotMatch",
    "InvalidSignatureException",
    "MissingAuthenticationToken",
];

const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "ThrottledException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

/// Map an HTTP status plus the service's error code to a typed error.
pub fn classify(service: &str, status: u16, code: &str, message: &str) -> CloudError {
    let service = service.to_string();
    let message = message.to_string();

    if ACCESS_DENIED_CODES.contains(&code) || status == 401 || status == 403 {
        return CloudError::AccessDenied {
            service,
            message: if message.is_empty() {
                code.to_string()
            } else {
                message
            },
        };
    }
    if THROTTLING_CODES.contains(&code) || status == 429 {
        return CloudError::Throttled { service };
    }
    if code.ends_with("NotFound")
        || code.ends_with("NotFoundException")
        || code.starts_with("NoSuch")
        || code.starts_with("InvalidInstanceID.NotFound")
        || status == 404
    {
        return CloudError::NotFound {
            service,
            code: code.to_string(),
            message,
        };
    }

    CloudError::Service {
        service,
        code: if code.is_empty() {
            format!("HTTP{status}")
        } else {
            code.to_string()
        },
        message,
    }
}

/// Extract `(code, message)` from a JSON protocol error body.
///
/// `__type` may carry a namespace prefix (`com.amazonaws.ssm#ParameterNotFound`)
/// and the message field is spelled either `message` or `Message`.
pub fn json_error(body: &[u8], header_type: Option<&str>) -> (String, String) {
    let value: serde_json::Value = serde_json::from_slice(body).unwrap_or_default();

    let raw_type = header_type
        .map(str::to_string)
        .or_else(|| value["__type"].as_str().map(str::to_string))
        .or_else(|| value["code"].as_str().map(str::to_string))
        .unwrap_or_default();
    let code = raw_type
        .rsplit('#')
        .next()
        .unwrap_or_default()
        .split(':')
        .next()
        .unwrap_or_default()
        .to_string();

    let message = value["message"]
        .as_str()
        .or_else(|| value["Message"].as_str())
        .unwrap_or_default()
        .to_string();
    (code, message)
}

/// Extract `(code, message)` from an XML error body (S3, EC2 or STS shape).
pub fn xml_error(body: &[u8]) -> (String, String) {
    let text = String::from_utf8_lossy(body);
    let Ok(root) = xml::parse(&text) else {
        return (String::new(), text.trim().to_string());
    };
    let error = root.find("Error").unwrap_or(&root);
    (
        error.text_of("Code").unwrap_or_default().to_string(),
        error.text_of("Message").unwrap_or_default().to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_strips_namespace() {
        let body = br#"{"__type":"com.amazonaws.ssm#ParameterNotFound","message":"gone"}"#;
        let (code, message) = json_error(body, None);
        assert_eq!(code, "ParameterNotFound");
        assert_eq!(message, "gone");
        assert!(classify("ssm", 400, &code, &message).is_not_found());
    }

    #[test]
    fn rest_json_error_header_wins() {
        let body = br#"{"Message":"No cluster found for name: prod."}"#;
        let (code, message) = json_error(body, Some("ResourceNotFoundException:http://internal"));
        assert_eq!(code, "ResourceNotFoundException");
        assert_eq!(message, "No cluster found for name: prod.");
    }

    #[test]
    fn xml_error_ec2_shape() {
        let body = br#"<?xml version="1.0"?>
<Response><Errors><Error><Code>UnauthorizedOperation</Code><Message>You are not authorized</Message></Error></Errors><RequestID>x</RequestID></Response>"#;
        let (code, message) = xml_error(body);
        assert_eq!(code, "UnauthorizedOperation");
        assert!(matches!(
            classify("ec2", 403, &code, &message),
            CloudError::AccessDenied { .. }
        ));
    }

    #[test]
    fn xml_error_sts_shape() {
        let body = br#"<ErrorResponse xmlns="https://sts.amazonaws.com/doc/2011-06-15/"><Error><Type>Sender</Type><Code>AccessDenied</Code><Message>not authorized to perform sts:AssumeRole</Message></Error></ErrorResponse>"#;
        let (code, message) = xml_error(body);
        assert_eq!(code, "AccessDenied");
        assert!(message.contains("sts:AssumeRole"));
    }

    #[test]
    fn throttling_and_fallthrough() {
        assert!(matches!(
            classify("ecs", 400, "ThrottlingException", ""),
            CloudError::Throttled { .. }
        ));
        assert!(matches!(
            classify("ecs", 500, "", "boom"),
            CloudError::Service { code, .. } if code == "HTTP500"
        ));
    }
}
