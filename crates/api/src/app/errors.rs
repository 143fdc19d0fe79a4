use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use billtrack_auth::{Decision, DenialReason, EvaluationError, Fallback};
use billtrack_core::DomainError;
use billtrack_infra::ServiceError;

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Denied(decision) => denied(&decision),
        ServiceError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        ServiceError::Domain(DomainError::InvalidId(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_id", msg)
        }
        ServiceError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "not found")
        }
        ServiceError::Domain(DomainError::Conflict(msg)) => {
            json_error(StatusCode::CONFLICT, "conflict", msg)
        }
        ServiceError::LastManager => json_error(
            StatusCode::CONFLICT,
            "last_manager",
            "a campaign must keep at least one manager",
        ),
        ServiceError::Store(e) => {
            tracing::warn!(error = %e, "membership store failure");
            retry_prompt(StatusCode::SERVICE_UNAVAILABLE, "lookup_failed")
        }
        ServiceError::Evaluation(e) => evaluation_error_to_response(e),
    }
}

/// Infrastructure failures never leak backend text; callers get a generic retry prompt.
pub fn evaluation_error_to_response(err: EvaluationError) -> axum::response::Response {
    match err {
        EvaluationError::Verification(e) => {
            json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
        }
        EvaluationError::Lookup(e) => {
            tracing::warn!(error = %e, "permission evaluation could not complete");
            retry_prompt(StatusCode::SERVICE_UNAVAILABLE, "lookup_failed")
        }
        EvaluationError::Aborted(cause) => {
            tracing::warn!(%cause, "permission evaluation aborted");
            retry_prompt(StatusCode::GATEWAY_TIMEOUT, "evaluation_aborted")
        }
    }
}

/// 403 for a denied mutating request, with a redirect hint for the UI.
pub fn denied(decision: &Decision) -> axum::response::Response {
    (
        StatusCode::FORBIDDEN,
        axum::Json(json!({
            "error": "forbidden",
            "message": decision.reason(),
            "tier": decision.tier,
            "redirect": redirect_hint(decision),
        })),
    )
        .into_response()
}

/// Where the UI should send a caller after a denial, if anywhere.
///
/// Registration and subscription denials map to login/pricing; team-role
/// denials have no page that would fix them.
pub fn redirect_hint(decision: &Decision) -> Option<&'static str> {
    match decision.denial? {
        DenialReason::MustBeRegistered
        | DenialReason::MustBeRegisteredToTrack
        | DenialReason::RequiresPaidSubscription => match Fallback::for_tier(decision.tier) {
            Fallback::Login => Some("/login"),
            _ => Some("/pricing"),
        },
        _ => None,
    }
}

fn retry_prompt(status: StatusCode, code: &'static str) -> axum::response::Response {
    json_error(
        status,
        code,
        "could not determine permissions right now; please retry",
    )
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use billtrack_auth::{ActionName, PermissionAction, SubscriptionTier, decide};

    fn decision(tier: SubscriptionTier, action: PermissionAction) -> Decision {
        decide(tier, None, &ActionName::from(action), false)
    }

    #[test]
    fn anonymous_denials_point_to_login() {
        let d = decision(SubscriptionTier::Anonymous, PermissionAction::CreateCampaign);
        assert_eq!(redirect_hint(&d), Some("/login"));
    }

    #[test]
    fn free_tier_paywall_points_to_pricing() {
        let d = decision(SubscriptionTier::Free, PermissionAction::CreateCampaign);
        assert_eq!(redirect_hint(&d), Some("/pricing"));
    }

    #[test]
    fn team_role_denials_have_no_redirect() {
        let d = decision(SubscriptionTier::Paid, PermissionAction::ManageTeam);
        assert_eq!(redirect_hint(&d), None);
    }

    #[test]
    fn status_codes_per_failure() {
        use billtrack_auth::{AbortCause, LookupError, VerificationError};

        let cases = [
            (EvaluationError::Verification(VerificationError::Expired), StatusCode::UNAUTHORIZED),
            (EvaluationError::Lookup(LookupError::unavailable("down")), StatusCode::SERVICE_UNAVAILABLE),
            (EvaluationError::Aborted(AbortCause::TimedOut), StatusCode::GATEWAY_TIMEOUT),
        ];
        for (err, status) in cases {
            assert_eq!(evaluation_error_to_response(err).status(), status);
        }

        assert_eq!(
            service_error_to_response(ServiceError::LastManager).status(),
            StatusCode::CONFLICT
        );
    }
}
