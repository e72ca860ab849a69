//! Whole-document save and load

use tour_core::overlay::{AudioType, TextObject};
use tour_core::xml::{XmlElement, XmlWriter};
use tour_core::{
    Color, EngineContext, ExtractMode, FileCabinet, Layer, LayerInfo, LoadOptions, Overlay,
    OverlayKind, Place, ReferenceFrame, TourDocument, TourStop,
};

fn minimal_tour() -> TourDocument {
    let mut stop = TourStop::new(Place::sky("Polaris", 2.53, 89.26, 30.0));
    stop.set_duration_ms(5000);
    let mut image = Overlay::bitmap("Image 1", "image1.png", 960.0, 600.0, 100.0, 100.0);
    image.set_color(Color::WHITE);
    stop.add_overlay(image);

    let mut doc = TourDocument::new();
    doc.set_title("Minimal");
    doc.add_tour_stop(stop);
    doc
}

#[test]
fn test_minimal_tour_xml_roundtrip() {
    let mut ctx = EngineContext::new();
    let doc = minimal_tour();
    let xml = doc.get_tour_xml(&ctx);

    let el = XmlElement::parse(&xml).unwrap();
    let reparsed = TourDocument::from_xml(&el, &mut ctx, &LoadOptions::default()).unwrap();

    assert_eq!(reparsed.tour_stop_count(), 1);
    assert_eq!(reparsed.id(), doc.id());
    let stop = &reparsed.stops()[0];
    assert_eq!(stop.duration_ms(), 5000);
    let overlay = &stop.overlays()[0];
    assert_eq!(overlay.name, "Image 1");
    assert_eq!(overlay.x(), 960.0);
    assert_eq!(overlay.y(), 600.0);
    assert_eq!(overlay.width(), 100.0);
    assert_eq!(overlay.height(), 100.0);
    assert_eq!(overlay.color(), Color::WHITE);
}

#[test]
fn test_dirty_flag_cleared_by_save_and_load() {
    let mut ctx = EngineContext::new();
    let mut doc = minimal_tour();
    assert!(doc.tour_dirty());

    let blob = doc.save_to_blob(&ctx);
    assert!(!doc.tour_dirty());
    doc.set_title("Renamed");
    assert!(doc.tour_dirty());

    let mut loaded = TourDocument::from_blob(blob, &mut ctx, &LoadOptions::default()).unwrap();
    assert!(!loaded.tour_dirty());
    loaded.add_tour_stop(TourStop::new(Place::default()));
    assert!(loaded.tour_dirty());

    loaded.save_to_blob(&ctx);
    assert!(!loaded.tour_dirty());
    loaded.stop_mut(0).unwrap().set_caption("edited");
    assert!(loaded.tour_dirty());
}

#[test]
fn test_archive_carries_media_thumbnails_and_layers() {
    let mut ctx = EngineContext::new();
    let mut frame = ReferenceFrame::new("ISS", "Earth");
    frame.mean_radius = 1.0;
    ctx.frames.register(frame);
    let mut layer = Layer::new("Orbit", "TerraViewer.SpreadSheetLayer", "ISS");
    layer.data_files.push(("orbit.csv".into(), b"t,x,y\n0,1,2\n".to_vec()));
    let layer_id = layer.id.clone();
    ctx.layers.add(layer);

    let mut doc = minimal_tour();
    doc.add_cached_file("image1.png", vec![0x89, b'P', b'N', b'G']);
    doc.add_cached_file("music.mp3", vec![0xFF; 64]);
    {
        let stop = doc.stop_mut(0).unwrap();
        stop.set_thumbnail(Some(vec![1, 2, 3]));
        stop.set_music_track(Some(Overlay::audio("music", "music.mp3", AudioType::Music)));
        stop.set_layer_info(&layer_id, LayerInfo::new(1.0, 0.5));
    }
    let stop_id = doc.stops()[0].id().to_string();
    let blob = doc.save_to_blob(&ctx);

    let fc = FileCabinet::from_bytes(blob.clone(), ExtractMode::Strict).unwrap();
    let names: Vec<&str> = fc.entries().iter().map(|e| e.filename.as_str()).collect();
    assert_eq!(names[0], "Tour.wwtxml");
    assert!(names.contains(&"image1.png"));
    assert!(names.contains(&"music.mp3"));
    assert!(names.contains(&format!("{}.thumb.png", stop_id).as_str()));
    assert!(names.contains(&format!("{}\\orbit.csv", layer_id).as_str()));

    // a fresh engine picks the layer and frame back up
    let mut fresh = EngineContext::new();
    let loaded = TourDocument::from_blob(blob, &mut fresh, &LoadOptions::strict()).unwrap();
    assert_eq!(loaded.get_cached_blob("image1.png"), Some(&[0x89, b'P', b'N', b'G'][..]));
    assert_eq!(loaded.stops()[0].thumbnail(), Some(&[1u8, 2, 3][..]));
    assert!(loaded.stops()[0].music_track().is_some());
    assert!(fresh.frames.get("ISS").is_some());
    let restored = fresh.layers.get(&layer_id).unwrap();
    assert_eq!(restored.data_files, vec![("orbit.csv".to_string(), b"t,x,y\n0,1,2\n".to_vec())]);
}

#[test]
fn test_truncated_archive_is_best_effort() {
    let mut ctx = EngineContext::new();
    let mut doc = minimal_tour();
    doc.add_cached_file("image1.png", vec![7; 4096]);
    let mut blob = doc.save_to_blob(&ctx);
    blob.truncate(blob.len() - 100);

    let lenient = TourDocument::from_blob(blob.clone(), &mut ctx, &LoadOptions::default()).unwrap();
    assert_eq!(lenient.tour_stop_count(), 1);
    assert!(lenient.get_cached_blob("image1.png").is_none());

    assert!(TourDocument::from_blob(blob, &mut ctx, &LoadOptions::strict()).is_err());
}

#[test]
fn test_huge_file_size_does_not_overflow() {
    let manifest = format!(
        "<FileCabinet HeaderSize=\"0x00000000\"><Files>\
         <File Name=\"Tour.wwtxml\" Size=\"7\"/>\
         <File Name=\"big.png\" Size=\"{}\"/></Files></FileCabinet>",
        usize::MAX
    );
    let manifest = manifest.replace("0x00000000", &format!("0x{:08X}", manifest.len()));
    let mut data = manifest.into_bytes();
    data.extend_from_slice(b"<Tour/>");

    let fc = FileCabinet::from_bytes(data.clone(), ExtractMode::Lenient).unwrap();
    assert_eq!(fc.entries().len(), 1);
    assert_eq!(fc.get_file_blob("Tour.wwtxml").unwrap().data, b"<Tour/>");
    assert!(fc.get_file_blob("big.png").is_none());

    let err = FileCabinet::from_bytes(data, ExtractMode::Strict).unwrap_err();
    assert!(matches!(err, tour_core::Error::SizeOverflow(name) if name == "big.png"));
}

#[test]
fn test_whitespace_only_text_round_trips() {
    let mut stop = TourStop::new(Place::sky("Vega", 18.6, 38.8, 20.0));
    stop.add_overlay(Overlay::text("t", TextObject::new("   "), 10.0, 10.0));

    let mut w = XmlWriter::new();
    stop.save_to_xml(&mut w);
    let reloaded = TourStop::try_from_xml(&XmlElement::parse(&w.into_string()).unwrap()).unwrap();
    match &reloaded.overlays()[0].kind {
        OverlayKind::Text(t) => assert_eq!(t.text_object.text, "   "),
        other => panic!("expected a text overlay, got {:?}", other),
    }
}

#[test]
fn test_garbage_is_an_empty_tour_when_lenient() {
    let mut ctx = EngineContext::new();
    let doc =
        TourDocument::from_blob(b"not a tour".to_vec(), &mut ctx, &LoadOptions::default())
            .unwrap();
    assert_eq!(doc.tour_stop_count(), 0);
    assert_eq!(ctx.errors().len(), 1);
}
