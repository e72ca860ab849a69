//! Playing tours through their links, loops and media

use tour_core::overlay::{AudioType, OverlayKind};
use tour_core::{EngineContext, Overlay, Place, TourDocument, TourStop, TransitionType};
use tour_player::{PlayerConfig, PlayerEvent, PlayerState, TourPlayer};

fn tour(n: usize) -> TourDocument {
    let mut doc = TourDocument::new();
    for i in 0..n {
        let mut stop = TourStop::new(Place::sky(&format!("s{}", i), i as f64, 0.0, 10.0));
        stop.set_duration_ms(1000);
        stop.set_transition(TransitionType::CrossCut);
        doc.add_tour_stop(stop);
    }
    doc.set_current_tour_stop_index(Some(0)).unwrap();
    doc
}

fn entered(events: &[PlayerEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::StopEntered { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

fn music_playing(player: &TourPlayer, index: usize) -> bool {
    match &player.document().stops()[index].music_track().unwrap().kind {
        OverlayKind::Audio(audio) => audio.media.is_playing(),
        _ => false,
    }
}

#[test]
fn test_plays_straight_through_and_finishes() {
    let mut player = TourPlayer::new(tour(3));
    let mut ctx = EngineContext::new();
    assert_eq!(entered(&player.play(0, &mut ctx).unwrap()), [0]);

    assert_eq!(entered(&player.update(1000, &mut ctx).unwrap()), [1]);
    assert_eq!(player.elapsed_in_stop(1000), 0);

    let events = player.update(3000, &mut ctx).unwrap();
    assert_eq!(entered(&events), [2]);
    assert_eq!(events.last(), Some(&PlayerEvent::Finished));
    assert_eq!(player.state(), PlayerState::Finished);
}

#[test]
fn test_large_tick_lands_mid_stop() {
    let mut player = TourPlayer::new(tour(3));
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    let events = player.update(2500, &mut ctx).unwrap();
    assert_eq!(entered(&events), [1, 2]);
    assert_eq!(player.current_index(), Some(2));
    assert_eq!(player.elapsed_in_stop(2500), 500);
    assert_eq!(player.tour_time_ms(2500), 2500);
}

#[test]
fn test_loop_starts_over() {
    let config = PlayerConfig {
        loop_tour: true,
        ..PlayerConfig::default()
    };
    let mut player = TourPlayer::with_config(tour(2), config);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    let events = player.update(2100, &mut ctx).unwrap();
    assert!(events.contains(&PlayerEvent::Looped));
    assert_eq!(player.current_index(), Some(0));
    assert_eq!(player.state(), PlayerState::Playing);
}

#[test]
fn test_zero_length_loop_does_not_spin() {
    let mut doc = tour(2);
    for i in 0..2 {
        doc.stop_mut(i).unwrap().set_duration_ms(0);
    }
    let config = PlayerConfig {
        loop_tour: true,
        ..PlayerConfig::default()
    };
    let mut player = TourPlayer::with_config(doc, config);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    let events = player.update(10, &mut ctx).unwrap();
    assert_eq!(entered(&events).len(), 3);
}

#[test]
fn test_next_slide_jumps_by_id() {
    let mut doc = tour(3);
    let last = doc.stops()[2].id().to_string();
    doc.stop_mut(0).unwrap().set_next_slide(&last);

    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    let events = player.update(1000, &mut ctx).unwrap();
    assert_eq!(events[0], PlayerEvent::LinkFollowed { from: 0, to: 2 });
    assert_eq!(player.current_index(), Some(2));
}

#[test]
fn test_links_ignored_when_disabled() {
    let mut doc = tour(3);
    let last = doc.stops()[2].id().to_string();
    doc.stop_mut(0).unwrap().set_next_slide(&last);

    let config = PlayerConfig {
        follow_links: false,
        ..PlayerConfig::default()
    };
    let mut player = TourPlayer::with_config(doc, config);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    player.update(1000, &mut ctx).unwrap();
    assert_eq!(player.current_index(), Some(1));
}

#[test]
fn test_overlay_link_and_return() {
    let mut doc = tour(3);
    let target = doc.stops()[2].id().to_string();
    let mut button = Overlay::bitmap("button", "button.png", 100.0, 100.0, 50.0, 50.0);
    button.link_id = target;
    doc.stop_mut(0).unwrap().add_overlay(button);
    doc.stop_mut(2).unwrap().set_next_slide("Return");

    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();

    assert!(player.click(500.0, 500.0, 200, &mut ctx).unwrap().is_empty());
    let events = player.click(110.0, 95.0, 300, &mut ctx).unwrap();
    assert_eq!(events[0], PlayerEvent::LinkFollowed { from: 0, to: 2 });

    let events = player.update(1300, &mut ctx).unwrap();
    assert_eq!(events[0], PlayerEvent::Returned { to: 0 });
    assert_eq!(player.current_index(), Some(0));
}

#[test]
fn test_return_without_caller_moves_on() {
    let mut doc = tour(2);
    doc.stop_mut(0).unwrap().set_next_slide("Return");
    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    player.update(1000, &mut ctx).unwrap();
    assert_eq!(player.current_index(), Some(1));
}

#[test]
fn test_entering_a_stop_syncs_settings() {
    let mut doc = tour(2);
    doc.stop_mut(1).unwrap().settings_mut().show_grid = true;
    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    assert!(!ctx.settings.show_grid);
    player.update(1000, &mut ctx).unwrap();
    assert!(ctx.settings.show_grid);
}

#[test]
fn test_music_waits_for_media_and_stops_on_exit() {
    let mut doc = tour(2);
    doc.stop_mut(0)
        .unwrap()
        .set_music_track(Some(Overlay::audio("music", "music.mp3", AudioType::Music)));
    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    assert!(!music_playing(&player, 0));

    player.media_ready("music.mp3");
    assert!(music_playing(&player, 0));

    player.pause(100).unwrap();
    assert!(!music_playing(&player, 0));
    player.resume(200).unwrap();
    assert!(music_playing(&player, 0));

    player.update(1100, &mut ctx).unwrap();
    assert_eq!(player.current_index(), Some(1));
    assert!(!music_playing(&player, 0));
}

#[test]
fn test_slew_comes_before_the_stop_duration() {
    let mut doc = tour(2);
    doc.stop_mut(1).unwrap().set_transition(TransitionType::Slew);
    let slew = TourDocument::slew_time_ms(&doc.stops()[0], &doc.stops()[1]);
    assert!(slew > 0);

    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    player.update(1000, &mut ctx).unwrap();
    assert_eq!(player.current_index(), Some(1));

    player.update(1000 + slew / 2, &mut ctx).unwrap();
    assert_eq!(player.document().stops()[1].tween_position(), 0.0);
    player.update(1000 + slew + 500, &mut ctx).unwrap();
    assert_eq!(player.document().stops()[1].tween_position(), 0.5);
    assert_eq!(
        player.tour_time_ms(1000 + slew + 500),
        player.document().elapsed_time_till_tour_stop(1) + slew + 500
    );
}

#[test]
fn test_time_since_master() {
    let mut doc = tour(3);
    doc.stop_mut(1).unwrap().set_master_slide(true);
    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    player.update(1250, &mut ctx).unwrap();
    assert_eq!(player.time_since_master_ms(1250), 250);
    player.update(2250, &mut ctx).unwrap();
    assert_eq!(player.time_since_master_ms(2250), 1250);
}

#[test]
fn test_playback_leaves_document_clean() {
    let mut doc = tour(2);
    doc.set_tour_dirty(false);
    let mut player = TourPlayer::new(doc);
    let mut ctx = EngineContext::new();
    player.play(0, &mut ctx).unwrap();
    player.update(1500, &mut ctx).unwrap();
    player.stop();
    assert!(!player.document().tour_dirty());
}
