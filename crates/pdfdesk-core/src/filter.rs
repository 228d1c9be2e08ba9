//! Pure projection of the record list through a filter.

use pdfdesk_protocol::{FilterState, Record};

/// Records passing `filter`, in list order. Never mutates the input.
pub fn view(records: &[Record], filter: FilterState) -> Vec<Record> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::view;
    use pdfdesk_protocol::{FilterState, Record};
    use pretty_assertions::assert_eq;

    #[test]
    fn projects_by_selection_flag() {
        let records = vec![
            Record::new(1, "a", "a.pdf", true),
            Record::new(2, "b", "b.pdf", false),
            Record::new(3, "c", "c.pdf", true),
        ];
        assert_eq!(view(&records, FilterState::All), records);
        assert_eq!(
            view(&records, FilterState::Selected),
            vec![records[0].clone(), records[2].clone()]
        );
        assert_eq!(view(&records, FilterState::Unselected), vec![records[1].clone()]);
        assert_eq!(records.len(), 3);
    }
}
