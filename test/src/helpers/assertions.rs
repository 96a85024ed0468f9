/// Assert that the kernel of a TestView mirrors its view context
#[macro_export]
macro_rules! assert_mirrored {
    ($view:expr) => {
        if let Err(message) = $view.verify_mirror() {
            panic!("Kernel does not mirror the view: {}", message);
        }
    };
}

/// Assert the record types of a change trail, in order
#[macro_export]
macro_rules! assert_trail_types {
    ($trail:expr, [$($record_type:ident),* $(,)?]) => {
        assert_eq!(
            $trail
                .iter()
                .map(|record| record.get_type())
                .collect::<Vec<_>>(),
            vec![$($crate::ChangeRecordType::$record_type),*],
            "Unexpected record types in change trail"
        );
    };
}
