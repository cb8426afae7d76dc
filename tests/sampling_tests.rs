use rum_agent::kernel::sampling::Sampler;

#[test]
fn test_rate_zero_never_emits() {
    let mut sampler = Sampler::seeded(1);
    let emitted = (0..1000).filter(|_| sampler.should_emit(0.0)).count();
    assert_eq!(emitted, 0);
}

#[test]
fn test_rate_one_always_emits() {
    let mut sampler = Sampler::seeded(2);
    let emitted = (0..1000).filter(|_| sampler.should_emit(1.0)).count();
    assert_eq!(emitted, 1000);
}

#[test]
fn test_fractional_rate_is_roughly_proportional() {
    let mut sampler = Sampler::seeded(3);
    let emitted = (0..10_000).filter(|_| sampler.should_emit(0.25)).count();
    println!("emitted {} of 10000 at rate 0.25", emitted);
    assert!((2000..3000).contains(&emitted), "Expected about 2500, got {}", emitted);
}

#[test]
fn test_same_seed_same_decisions() {
    let mut a = Sampler::seeded(99);
    let mut b = Sampler::seeded(99);
    let first: Vec<bool> = (0..100).map(|_| a.should_emit(0.5)).collect();
    let second: Vec<bool> = (0..100).map(|_| b.should_emit(0.5)).collect();
    assert_eq!(first, second);
}
