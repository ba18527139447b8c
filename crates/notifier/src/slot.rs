/// Notification slot for an order id.
///
/// 31-multiplier polynomial hash over the UTF-16 code units of the id with
/// wrapping `i32` arithmetic, so the same id always lands in the same slot.
/// Not collision-free over the whole id space.
pub fn slot_id(order_id: &str) -> i32 {
    order_id
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_slot_id_is_deterministic() {
        assert_eq!(slot_id("004"), slot_id("004"));
        assert_eq!(slot_id(""), 0);
    }

    #[test]
    fn test_known_values() {
        // '0' = 48, '4' = 52
        assert_eq!(slot_id("004"), 48 * 31 * 31 + 48 * 31 + 52);
        assert_eq!(slot_id("a"), 97);
    }

    #[test]
    fn test_long_ids_wrap_instead_of_overflowing() {
        let id = "pedido-con-un-identificador-muy-largo-0123456789";
        assert_eq!(slot_id(id), slot_id(id));
    }

    #[test]
    fn test_non_ascii_ids_hash_utf16_units() {
        assert_eq!(slot_id("ñ"), 0xF1);
        assert_ne!(slot_id("pedido-ñ"), slot_id("pedido-n"));
    }

    #[test]
    fn test_no_collisions_for_representative_ids() {
        let ids: Vec<String> = (0..100).map(|n| format!("{:03}", n)).collect();
        let slots: HashSet<i32> = ids.iter().map(|id| slot_id(id)).collect();
        assert_eq!(slots.len(), ids.len());

        let prefixed: HashSet<i32> = (0..1000)
            .map(|n| slot_id(&format!("ORD-{:04}", n)))
            .collect();
        assert_eq!(prefixed.len(), 1000);
    }
}
