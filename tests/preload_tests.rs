use detail_slideshow::preload::{self, LOADING_CLASS};
use detail_slideshow::testkit::{self, Fixture};

#[tokio::test]
async fn preload_probes_images_and_lifts_loading_state() {
    let dir = tempfile::tempdir().unwrap();
    let img_dir = dir.path().join("img");
    std::fs::create_dir(&img_dir).unwrap();
    image::RgbImage::new(4, 3).save(img_dir.join("1.jpg")).unwrap();
    // 2.jpg is missing and 3.jpg is not an image.
    std::fs::write(img_dir.join("3.jpg"), b"not a jpeg").unwrap();

    let Fixture { show, .. } = testkit::mount(3).unwrap();
    let body = show.dom().read(|doc| doc.body().unwrap());
    assert!(show.dom().read(|doc| doc.has_class(body, LOADING_CLASS)));

    let report = preload::preload(show.dom().clone(), show.image_elements(), dir.path(), 2).await;

    assert_eq!(report.loaded, [img_dir.join("1.jpg")]);
    let mut failed = report.failed.clone();
    failed.sort();
    assert_eq!(failed, [img_dir.join("2.jpg"), img_dir.join("3.jpg")]);
    assert_eq!(report.without_source, 0);
    assert!(!show.dom().read(|doc| doc.has_class(body, LOADING_CLASS)));
}

#[tokio::test]
async fn preload_without_sources_still_finishes() {
    let Fixture { show, .. } = testkit::mount(2).unwrap();
    let images = show.image_elements();
    show.dom().write(|doc| {
        for id in &images {
            doc.set_attribute(*id, "style", "background: none");
        }
    });

    let report = preload::preload(show.dom().clone(), images, std::path::Path::new("."), 4).await;

    assert!(report.loaded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.without_source, 2);
    let body = show.dom().read(|doc| doc.body().unwrap());
    assert!(!show.dom().read(|doc| doc.has_class(body, LOADING_CLASS)));
}
