//! Permission strings are `<resource>.<action>`; roles hold a list of them.
//! `*` grants everything inside the agency and `<resource>.*` grants every
//! action on one resource.

pub const ALL: &str = "*";

pub const RESOURCES: &[&str] = &[
    "agency",
    "branch",
    "role",
    "staff",
    "client",
    "country",
    "state",
    "city",
    "bank",
    "hotel",
    "sector",
    "service",
    "fair",
    "booking",
    "follow_up",
    "group_booking",
    "hotel_booking",
    "journey_booking",
    "vehicle_booking",
    "receipt",
    "invoice",
    "subscription",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    View,
    Create,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Action::View),
            "create" => Some(Action::Create),
            "update" => Some(Action::Update),
            "delete" => Some(Action::Delete),
            _ => None,
        }
    }
}

pub fn permission(resource: &str, action: Action) -> String {
    format!("{resource}.{}", action.as_str())
}

pub fn grants(granted: &[String], required: &str) -> bool {
    let resource = required.split_once('.').map(|(r, _)| r);
    granted.iter().any(|g| {
        g == ALL || g == required || resource.is_some_and(|r| g.strip_suffix(".*") == Some(r))
    })
}

/// Whether `p` names a real permission (used to validate role definitions).
pub fn is_known(p: &str) -> bool {
    if p == ALL {
        return true;
    }
    let Some((resource, action)) = p.split_once('.') else {
        return false;
    };
    RESOURCES.contains(&resource) && (action == "*" || Action::parse(action).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn exact_and_wildcards() {
        assert!(grants(&perms(&["client.view"]), "client.view"));
        assert!(!grants(&perms(&["client.view"]), "client.delete"));
        assert!(grants(&perms(&["client.*"]), "client.delete"));
        assert!(!grants(&perms(&["client.*"]), "booking.view"));
        assert!(grants(&perms(&["*"]), "invoice.create"));
        assert!(!grants(&[], "invoice.create"));
    }

    #[test]
    fn resource_wildcard_does_not_match_prefixes() {
        assert!(!grants(&perms(&["booking.*"]), "booking_receipt.view"));
    }

    #[test]
    fn known_permissions() {
        assert!(is_known("hotel_booking.create"));
        assert!(is_known("invoice.*"));
        assert!(is_known("*"));
        assert!(!is_known("hotel.fly"));
        assert!(!is_known("spaceship.view"));
        assert!(!is_known("client"));
    }

    #[test]
    fn builds_permission_strings() {
        assert_eq!(permission("receipt", Action::Update), "receipt.update");
    }
}
