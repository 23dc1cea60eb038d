//! Allow-list authorizer for relay callers.

use std::collections::HashSet;

use crate::domain::{Authorization, CallerId, Netuid};
use crate::ports::Authorizer;

/// Admits callers whose key is listed, or who act for a listed subnet.
#[derive(Clone, Debug, Default)]
pub struct AllowList {
    callers: HashSet<String>,
    subnets: HashSet<Netuid>,
}

impl AllowList {
    /// Build from caller keys and subnet ids.
    pub fn new(
        callers: impl IntoIterator<Item = String>,
        subnets: impl IntoIterator<Item = Netuid>,
    ) -> Self {
        Self {
            callers: callers.into_iter().collect(),
            subnets: subnets.into_iter().collect(),
        }
    }

    /// Nothing is admitted.
    pub fn is_empty(&self) -> bool {
        self.callers.is_empty() && self.subnets.is_empty()
    }
}

impl Authorizer for AllowList {
    fn authorize(&self, caller: &CallerId) -> Authorization {
        if self.callers.contains(&caller.key) {
            return Authorization::Allowed;
        }
        match caller.subnet_id {
            Some(netuid) if self.subnets.contains(&netuid) => Authorization::Allowed,
            Some(netuid) => Authorization::denied(format!(
                "caller is not allow-listed and subnet {netuid} is not permitted"
            )),
            None => Authorization::denied("caller is not allow-listed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listed_key_allowed() {
        let list = AllowList::new(vec!["5Alice".to_string()], vec![]);
        assert_eq!(list.authorize(&CallerId::new("5Alice", None)), Authorization::Allowed);
        assert!(matches!(
            list.authorize(&CallerId::new("5Bob", None)),
            Authorization::Denied { .. }
        ));
    }

    #[test]
    fn test_listed_subnet_allowed() {
        let list = AllowList::new(Vec::<String>::new(), vec![21]);
        assert_eq!(list.authorize(&CallerId::new("anyone", Some(21))), Authorization::Allowed);
        assert!(matches!(
            list.authorize(&CallerId::new("anyone", Some(3))),
            Authorization::Denied { .. }
        ));
    }

    #[test]
    fn test_empty_list_denies_everyone() {
        let list = AllowList::default();
        assert!(list.is_empty());
        assert!(matches!(
            list.authorize(&CallerId::new("x", Some(1))),
            Authorization::Denied { .. }
        ));
    }
}
