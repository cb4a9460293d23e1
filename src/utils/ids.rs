use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn base36_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// `analysis-<unix millis>-<9 base36 chars>`
pub fn analysis_id() -> String {
    format!(
        "analysis-{}-{}",
        Utc::now().timestamp_millis(),
        base36_suffix(9)
    )
}

/// `batch-<unix millis>-<4 base36 chars>`
pub fn batch_id() -> String {
    format!("batch-{}-{}", Utc::now().timestamp_millis(), base36_suffix(4))
}

pub fn calibration_id() -> String {
    format!("cal_{}", Uuid::new_v4())
}

pub fn piece_type_id() -> String {
    format!("pt_{}", Uuid::new_v4())
}

pub fn audit_event_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_ids_have_expected_shape() {
        let id = analysis_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "analysis");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn prefixed_ids_are_unique() {
        assert_ne!(batch_id(), batch_id());
        assert!(calibration_id().starts_with("cal_"));
        assert!(piece_type_id().starts_with("pt_"));
    }
}
