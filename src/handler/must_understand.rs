use crate::binding::Binding;
use crate::error::FaultDetail;
use crate::message::{Message, QName};
use std::collections::HashSet;

/// Check every mandatory header block targeted at this node against the
/// understood set. Blocks addressed to other roles are ignored.
pub(crate) fn check(
    message: &Message,
    binding: Binding,
    understood: &HashSet<QName>,
) -> Result<(), FaultDetail> {
    let missing: Vec<QName> = message
        .headers
        .iter()
        .filter(|h| h.must_understand)
        .filter(|h| binding.targets_this_node(h.role.as_deref()))
        .filter(|h| !understood.contains(&h.name))
        .map(|h| h.name.clone())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(FaultDetail::must_understand(binding, missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Body, HeaderBlock};
    use serde_json::json;

    fn message(blocks: Vec<HeaderBlock>) -> Message {
        let mut msg = Message::new(Body::Content(json!({})));
        msg.headers = blocks;
        msg
    }

    #[test]
    fn test_optional_headers_pass() {
        let msg = message(vec![HeaderBlock::new(QName::new("urn:x", "Opt"), json!(1))]);
        assert!(check(&msg, Binding::Soap11, &HashSet::new()).is_ok());
    }

    #[test]
    fn test_unknown_mandatory_header_faults() {
        let name = QName::new("urn:x", "Security");
        let msg = message(vec![HeaderBlock::new(name.clone(), json!(1)).must_understand()]);
        let fault = check(&msg, Binding::Soap12, &HashSet::new()).unwrap_err();
        assert!(fault.is_must_understand());
        assert_eq!(fault.not_understood, vec![name.clone()]);
        assert_eq!(fault.code.namespace, Binding::Soap12.envelope_namespace());

        let understood: HashSet<_> = [name].into_iter().collect();
        assert!(check(&msg, Binding::Soap12, &understood).is_ok());
    }

    #[test]
    fn test_other_roles_are_ignored() {
        let msg = message(vec![HeaderBlock::new(QName::new("urn:x", "Hop"), json!(1))
            .must_understand()
            .with_role("urn:some-intermediary")]);
        assert!(check(&msg, Binding::Soap11, &HashSet::new()).is_ok());

        let msg = message(vec![HeaderBlock::new(QName::new("urn:x", "Hop"), json!(1))
            .must_understand()
            .with_role("http://schemas.xmlsoap.org/soap/actor/next")]);
        assert!(check(&msg, Binding::Soap11, &HashSet::new()).is_err());
    }
}
