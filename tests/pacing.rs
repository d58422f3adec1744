mod common;

use blitter::{BufferingMode, Config, Extent, Rect, ScalingMethod, MAX_PRESENT_INTERVAL};
use common::{frame, scheduler};

fn paced_config() -> Config {
    Config::default()
        .with_buffering(BufferingMode::BlitCopy)
        .with_vblank_blit(true)
}

#[test]
fn test_second_draw_without_blit_is_noop() {
    let (mut s, log, _) = scheduler(Config::default());
    let pixels = frame();
    s.blit(&pixels, 160, 144);
    assert!(s.draw());
    assert!(!s.draw());
    assert_eq!(log.borrow().draws, 1);

    s.blit(&pixels, 160, 144);
    assert!(s.draw());
    assert_eq!(log.borrow().draws, 2);
}

#[test]
fn test_sync_presents_only_after_draw() {
    let (mut s, log, _) = scheduler(Config::default());
    s.sync();
    assert!(log.borrow().present_intervals.is_empty());

    let pixels = frame();
    s.blit(&pixels, 160, 144);
    s.sync();
    assert!(log.borrow().present_intervals.is_empty());

    s.draw();
    s.sync();
    s.sync();
    assert_eq!(log.borrow().present_intervals, [1]);
}

#[test]
fn test_rate_change_discards_history() {
    let config = Config::default().with_refresh_rate(500);
    let (mut s, _, clock) = scheduler(config);
    let pixels = frame();
    for _ in 0..8 {
        s.blit(&pixels, 160, 144);
        s.draw();
        clock.advance(20_000);
        s.sync();
    }
    assert_eq!(s.frame_time_est(), 20_000);
    assert_eq!(s.estimator().samples().count(), 8);

    s.rate_change(600);
    assert_eq!(s.frame_time_est(), 16_667);
    assert_eq!(s.estimator().samples().count(), 0);
}

#[test]
fn test_paced_blit_waits_for_estimated_boundary() {
    let (mut s, log, clock) = scheduler(paced_config());
    let pixels = frame();

    // No sample yet: present immediately
    s.blit(&pixels, 160, 144);
    s.draw();
    s.sync();
    assert!(clock.sleeps().is_empty());
    assert_eq!(s.estimator().last_sample_time(), Some(1_000_000));

    clock.advance(4_000);
    s.blit(&pixels, 160, 144);
    s.draw();
    let elapsed = s.sync();
    assert_eq!(clock.sleeps(), [12_667]);
    assert_eq!(clock.now(), 1_016_667);
    assert_eq!(elapsed, 16_667);

    // The driver never waits on paced presents
    assert_eq!(log.borrow().present_intervals, [0, 0]);
}

#[test]
fn test_pacing_wait_is_bounded() {
    let (mut s, _, clock) = scheduler(paced_config());
    let pixels = frame();
    let limit = 2 * s.frame_time_est();

    for step in [0, 1, 9_000, 16_666, 16_667, 40_000, 100_000] {
        clock.advance(step);
        s.blit(&pixels, 160, 144);
        s.draw();
        s.sync();
    }
    assert!(clock.sleeps().iter().all(|&slept| slept <= limit));
    assert_eq!(s.abandoned_waits(), 0);

    // A clock that jumped backwards projects a boundary past the bound
    clock.set(500_000);
    s.blit(&pixels, 160, 144);
    s.draw();
    let sleeps_before = clock.sleeps().len();
    s.sync();
    assert_eq!(s.abandoned_waits(), 1);
    assert_eq!(clock.sleeps().len(), sleeps_before);
}

#[test]
fn test_non_blocking_presents_do_not_feed_estimator() {
    let config = Config::default().with_swap_interval(0);
    let (mut s, _, clock) = scheduler(config);
    let pixels = frame();
    for _ in 0..4 {
        s.blit(&pixels, 160, 144);
        s.draw();
        clock.advance(3_000);
        s.sync();
    }
    assert_eq!(s.estimator().samples().count(), 0);
    assert_eq!(s.frame_time_est(), 16_667);
}

#[test]
fn test_integer_scaling_quad_on_device() {
    let config = Config::default()
        .with_window(700, 600)
        .with_scaling(ScalingMethod::Integer);
    let (mut s, log, _) = scheduler(config);
    let pixels = frame();
    s.blit(&pixels, 160, 144);
    s.draw();

    let quad = log.borrow().last_quad.unwrap();
    assert_eq!(
        quad.placement,
        Rect {
            x: 30,
            y: 12,
            width: 640,
            height: 576,
        }
    );
    assert_eq!(quad.uv_max, [0.625, 0.5625]);

    s.resize(640, 576).unwrap();
    s.draw();
    let quad = log.borrow().last_quad.unwrap();
    assert_eq!(
        quad.placement,
        Rect {
            x: 0,
            y: 0,
            width: 640,
            height: 576,
        }
    );
}

#[test]
fn test_margins_cleared_once_per_buffer_on_copy_chains() {
    let config = Config::default()
        .with_window(700, 600)
        .with_scaling(ScalingMethod::Integer)
        .with_buffering(BufferingMode::BlitCopy);
    let (mut s, log, _) = scheduler(config);
    let pixels = frame();
    for _ in 0..3 {
        s.blit(&pixels, 160, 144);
        s.draw();
        s.sync();
    }
    assert_eq!(log.borrow().draws, 3);
    assert_eq!(log.borrow().clears, 1);
}

#[test]
fn test_margins_cleared_every_frame_on_flip_chains() {
    let config = Config::default()
        .with_window(700, 600)
        .with_scaling(ScalingMethod::Integer)
        .with_buffering(BufferingMode::DoubleFlip);
    let (mut s, log, _) = scheduler(config);
    let pixels = frame();
    for _ in 0..3 {
        s.blit(&pixels, 160, 144);
        s.draw();
        s.sync();
    }
    assert_eq!(log.borrow().clears, 3);
}

#[test]
fn test_malformed_frame_keeps_previous_on_screen() {
    let (mut s, log, _) = scheduler(Config::default());
    let pixels = frame();
    s.blit(&pixels, 160, 144);
    s.draw();

    s.blit(&pixels[..100], 160, 144);
    s.blit(&pixels, 0, 144);
    assert_eq!(s.dropped_frames(), 2);
    assert!(!s.draw());
    assert_eq!(log.borrow().uploads, 1);
}

#[test]
fn test_failed_upload_after_growth_keeps_previous_frame() {
    let (mut s, log, _) = scheduler(Config::default());
    let pixels = frame();
    s.blit(&pixels, 160, 144);
    s.draw();

    log.borrow_mut().fail_uploads = 1;
    let wide = vec![0; 320 * 144];
    s.blit(&wide, 320, 144);
    assert!(!s.is_dirty());
    // Only the replacement texture was released
    assert_eq!(log.borrow().textures_created, 2);
    assert_eq!(log.borrow().releases, ["texture"]);

    s.resize(640, 576).unwrap();
    assert!(s.draw());
    assert_eq!(log.borrow().drawn_texture, Some(Extent::new(256, 256)));
}

#[test]
fn test_long_swap_interval_capped_at_driver() {
    let config = Config::default()
        .with_buffering(BufferingMode::TripleBuffer)
        .with_swap_interval(4);
    let (mut s, log, _) = scheduler(config);
    let pixels = frame();
    s.blit(&pixels, 160, 144);
    s.draw();
    s.sync();
    assert_eq!(log.borrow().present_intervals, [MAX_PRESENT_INTERVAL]);
    assert_eq!(s.surface().params().unwrap().swap_interval, 4);
}
