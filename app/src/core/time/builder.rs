#[macro_export]
macro_rules! t {
    (now) => {{
        $crate::core::time::DateTime::now()
    }};

    ($amount:literal seconds) => {{
        $crate::core::time::Duration::seconds($amount)
    }};
    ($amount:literal minutes) => {{
        $crate::core::time::Duration::minutes($amount)
    }};
    ($amount:literal hours) => {{
        $crate::core::time::Duration::hours($amount)
    }};

    ($amount:literal minutes ago) => {{
        t!(now) - t!($amount minutes)
    }};
    ($amount:literal hours ago) => {{
        t!(now) - t!($amount hours)
    }};

    (in $amount:literal minutes) => {{
        t!(now) + t!($amount minutes)
    }};
    (in $amount:literal hours) => {{
        t!(now) + t!($amount hours)
    }};
}
