pub mod ids;

pub use ids::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_is_slot_zero() {
        let nil = NodeID::nil();
        assert!(nil.is_nil());
        assert_eq!(NodeID::default(), nil);
        assert!(NodeID::from_parts(0, 4).is_nil());
        assert!(!NodeID::from_parts(5, 2).is_nil());
    }

    #[test]
    fn handles_print_and_parse_as_index_colon_generation() {
        let id = NodeID::from_parts(42, 3);
        assert_eq!(id.to_string(), "42:3");
        assert_eq!("42:3".parse::<NodeID>(), Ok(id));
        assert_eq!(" 42 : 3 ".parse::<NodeID>(), Ok(id));
        assert_eq!(format!("{id:?}"), "NodeID(42:3)");
        let max = NodeID::from_parts(u32::MAX, u32::MAX);
        assert_eq!(max.to_string().parse::<NodeID>(), Ok(max));
    }

    #[test]
    fn malformed_handles_are_rejected() {
        assert_eq!(
            "42".parse::<NodeID>(),
            Err(NodeIdError::Malformed("42".to_string()))
        );
        assert_eq!(
            "1:-1".parse::<NodeID>(),
            Err(NodeIdError::BadNumber {
                text: "1:-1".to_string(),
                part: "generation",
            })
        );
        assert!("a:b".parse::<NodeID>().is_err());
    }

    #[test]
    fn reused_slot_gives_a_different_handle() {
        let first = NodeID::from_parts(7, 0);
        let reused = NodeID::from_parts(7, 1);
        assert_ne!(first, reused);
        assert_eq!(first.index(), reused.index());
        assert!(first < reused);
    }
}
