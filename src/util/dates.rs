use chrono::{DateTime, Local};

pub fn local_date_yyyy_mm_dd() -> String {
    let now: DateTime<Local> = Local::now();
    now.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_has_iso_shape() {
        let date = local_date_yyyy_mm_dd();
        assert_eq!(date.len(), 10);
        assert_eq!(date.matches('-').count(), 2);
    }
}
