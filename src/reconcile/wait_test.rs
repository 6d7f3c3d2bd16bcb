//! Tests for wait policies.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::invoker::OperationRegistry;
use crate::reconcile::{WaitPolicy, delay_for};
use crate::types::Tag;

#[test]
fn static_and_exponential() {
  let s = WaitPolicy::Static { wait_in_seconds: 1.5 };
  assert_eq!(s.delay(0), Duration::from_millis(1500));
  assert_eq!(s.delay(7), Duration::from_millis(1500));

  let e = WaitPolicy::Exponential {
    wait_in_seconds: 1.0,
    multiplier: 2.0,
  };
  assert_eq!(e.delay(0), Duration::from_secs(1));
  assert_eq!(e.delay(3), Duration::from_secs(8));
}

#[test]
fn random_stays_in_range() {
  let r = WaitPolicy::Random {
    min_value: 2.0,
    max_value: 1.0,
  };
  for i in 0..50 {
    let d = r.delay(i);
    assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(2), "{d:?}");
  }
}

#[test]
fn degenerate_values_clamp() {
  assert_eq!(WaitPolicy::none().delay(0), Duration::ZERO);
  assert_eq!(WaitPolicy::Static { wait_in_seconds: -4.0 }.delay(0), Duration::ZERO);
  assert_eq!(
    WaitPolicy::Static {
      wait_in_seconds: f64::NAN
    }
    .delay(0),
    Duration::ZERO
  );
  let huge = WaitPolicy::Exponential {
    wait_in_seconds: 1.0,
    multiplier: 1e300,
  };
  assert_eq!(huge.delay(5), Duration::MAX);
  assert_eq!(
    WaitPolicy::Static {
      wait_in_seconds: 1e30
    }
    .delay(0),
    Duration::MAX
  );
}

#[test]
fn policy_json_shape() {
  let p: WaitPolicy =
    serde_json::from_str(r#"{"policy": "random", "min_value": 0.5, "max_value": 1.0}"#).unwrap();
  assert_eq!(
    p,
    WaitPolicy::Random {
      min_value: 0.5,
      max_value: 1.0
    }
  );
  assert_eq!(WaitPolicy::default(), WaitPolicy::Static { wait_in_seconds: 3.0 });
}

#[test]
fn longest_provider_delay_wins() {
  let mut registry = OperationRegistry::new();
  registry.set_wait_policy("slow", WaitPolicy::Static { wait_in_seconds: 10.0 });
  let default = WaitPolicy::Static { wait_in_seconds: 1.0 };
  let pending = BTreeSet::from([
    Tag::from("fast_|-a_|-a_|-present"),
    Tag::from("slow_|-b_|-b_|-present"),
  ]);
  assert_eq!(delay_for(&pending, &registry, &default, 0), Duration::from_secs(10));
  let fast_only = BTreeSet::from([Tag::from("fast_|-a_|-a_|-present")]);
  assert_eq!(delay_for(&fast_only, &registry, &default, 0), Duration::from_secs(1));
  assert_eq!(delay_for(&BTreeSet::new(), &registry, &default, 0), Duration::ZERO);
}
