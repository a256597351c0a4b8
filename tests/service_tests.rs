#[cfg(test)]
mod service_tests {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::json;
    use test_case::test_case;

    use qrkit::{
        reader::QRReader,
        service::{BatchRequest, Config, CreateTrackedRequest, GenerateRequest, QrService, ScanMeta, ViewQuery},
        ECLevel,
    };

    const CALLER: &str = "203.0.113.7";

    fn service() -> QrService {
        QrService::new(Config { base_url: "https://qr.example".into(), ..Default::default() }).unwrap()
    }

    fn request(data: &str, f: impl FnOnce(&mut GenerateRequest)) -> GenerateRequest {
        let mut req = GenerateRequest::new(data);
        f(&mut req);
        req
    }

    fn logo_base64() -> String {
        let img = image::RgbaImage::from_pixel(32, 32, image::Rgba([200, 30, 30, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        STANDARD.encode(bytes.into_inner())
    }

    #[test_case("png", "square")]
    #[test_case("svg", "rounded")]
    #[test_case("pdf", "dots")]
    fn test_generate_is_deterministic(format: &str, style: &str) {
        let svc = service();
        let req = request("same input", |r| {
            r.format = format.into();
            r.style = style.into();
        });
        let a = svc.generate(CALLER, &req).unwrap().value;
        let b = svc.generate(CALLER, &req).unwrap().value;
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(a.image_base64, b.image_base64);
    }

    #[test]
    fn test_generate_is_sensitive() {
        let svc = service();
        let base = svc.generate(CALLER, &GenerateRequest::new("payload")).unwrap().value;
        let variants = [
            request("payload!", |_| {}),
            request("payload", |r| r.style = "dots".into()),
            request("payload", |r| r.size = 300),
        ];
        for req in &variants {
            assert_ne!(svc.generate(CALLER, req).unwrap().value.bytes, base.bytes);
        }
    }

    #[test]
    fn test_generate_png_roundtrip() {
        let svc = service();
        let resp = svc.generate(CALLER, &request("{\"k\": [1, 2]}\nnext", |r| r.size = 400)).unwrap().value;
        assert!(resp.image_base64.starts_with("data:image/png;base64,"));
        assert_eq!(resp.format, "png");
        assert_eq!(QRReader::read(&resp.bytes).unwrap().data, "{\"k\": [1, 2]}\nnext");
    }

    #[test_case(63, false)]
    #[test_case(64, true)]
    #[test_case(4096, true)]
    #[test_case(4097, false)]
    fn test_size_boundaries(size: u32, ok: bool) {
        let svc = service();
        let res = svc.generate(CALLER, &request("bounds", |r| {
            r.format = "svg".into();
            r.size = size;
        }));
        match res {
            Ok(_) => assert!(ok),
            Err(e) => {
                assert!(!ok);
                assert_eq!((e.status(), e.code()), (400, "INVALID_SIZE"));
            }
        }
    }

    #[test]
    fn test_logo_forces_high_ec() {
        let svc = service();
        let req = request("logo inside", |r| {
            r.error_correction = "L".into();
            r.logo = Some(logo_base64());
            r.size = 512;
        });
        let resp = svc.generate(CALLER, &req).unwrap().value;
        let decoded = QRReader::read(&resp.bytes).unwrap();
        assert_eq!(decoded.data, "logo inside");
        assert_eq!(decoded.ec_level, ECLevel::H);
    }

    #[test_case(5, 256)]
    #[test_case(20, 256)]
    #[test_case(40, 256)]
    #[test_case(40, 512)]
    fn test_logo_sizes_stay_decodable(logo_size: u8, size: u32) {
        let svc = service();
        let data = "https://example.com/campaigns/autumn?ref=poster&slot=lobby-entrance-2";
        let req = request(data, |r| {
            r.error_correction = "L".into();
            r.logo = Some(logo_base64());
            r.logo_size = logo_size;
            r.size = size;
        });
        let resp = svc.generate(CALLER, &req).unwrap().value;
        let decoded = QRReader::read(&resp.bytes).unwrap();
        assert_eq!(decoded.data, data);
        assert_eq!(decoded.ec_level, ECLevel::H);
    }

    #[test]
    fn test_decode() {
        let svc = service();
        let resp = svc.generate(CALLER, &GenerateRequest::new("decode me")).unwrap().value;
        let decoded = svc.decode(CALLER, &resp.bytes).unwrap().value;
        assert_eq!((decoded.data.as_str(), decoded.format.as_str()), ("decode me", "qr"));

        let blank = image::RgbImage::from_pixel(120, 120, image::Rgb([255, 255, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        blank.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        let err = svc.decode(CALLER, &bytes.into_inner()).unwrap_err();
        assert_eq!((err.status(), err.code()), (422, "NO_QR_FOUND"));

        assert_eq!(svc.decode(CALLER, b"not an image").unwrap_err().code(), "INVALID_IMAGE");
    }

    #[test]
    fn test_batch_preserves_order() {
        let svc = service();
        let items: Vec<_> = (0..12).map(|i| GenerateRequest::new(format!("item-{i}"))).collect();
        let resp = svc.batch(CALLER, &BatchRequest { items }).unwrap().value;
        assert_eq!(resp.total, 12);
        for (i, item) in resp.items.iter().enumerate() {
            assert_eq!(item.data, format!("item-{i}"));
            assert_eq!(QRReader::read(&item.bytes).unwrap().data, item.data);
        }
    }

    #[test_case(0, Some("EMPTY_BATCH"))]
    #[test_case(50, None)]
    #[test_case(51, Some("BATCH_TOO_LARGE"))]
    fn test_batch_boundaries(len: usize, code: Option<&str>) {
        let svc = service();
        let items = vec![request("b", |r| r.format = "svg".into()); len];
        let res = svc.batch(CALLER, &BatchRequest { items });
        assert_eq!(res.as_ref().err().map(|e| e.code()), code);
        if let Ok(resp) = res {
            assert_eq!(resp.value.total, len);
        }
    }

    #[test]
    fn test_templates() {
        let svc = service();
        let wifi = svc.template(CALLER, "wifi", &json!({"ssid": "Home;Net", "password": "p@ss"})).unwrap().value;
        assert_eq!(wifi.data, r"WIFI:T:WPA2;S:Home\;Net;P:p@ss;H:false;;");
        assert_eq!(QRReader::read(&wifi.bytes).unwrap().data, wifi.data);

        let card = svc.template(CALLER, "vcard", &json!({"name": "Grace Hopper", "phone": "+1 555"})).unwrap().value;
        assert_eq!(card.data, "BEGIN:VCARD\nFN:Grace Hopper\nTEL:+1 555\nEND:VCARD");

        let err = svc.template(CALLER, "geo", &json!({})).unwrap_err();
        assert_eq!((err.status(), err.code()), (400, "UNKNOWN_TEMPLATE"));
    }

    #[test]
    fn test_share_url_view() {
        let svc = service();
        let resp = svc.generate(CALLER, &request("shared", |r| r.format = "svg".into())).unwrap().value;

        let mut view = ViewQuery::default();
        for (key, value) in resp.share_url.split_once('?').unwrap().1.split('&').filter_map(|kv| kv.split_once('=')) {
            let value = urlencoding::decode(value).unwrap().into_owned();
            match key {
                "data" => view.data = value,
                "size" => view.size = value.parse().ok(),
                "fg" => view.fg = Some(value),
                "bg" => view.bg = Some(value),
                "format" => view.format = Some(value),
                "style" => view.style = Some(value),
                _ => panic!("unexpected share url key {key}"),
            }
        }

        let viewed = svc.view(&view).unwrap();
        assert_eq!(viewed.mime, "image/svg+xml");
        assert_eq!(viewed.bytes, resp.bytes);
    }

    #[test]
    fn test_tracked_lifecycle() {
        let svc = service();
        let mut req = CreateTrackedRequest::new("https://example.com/landing");
        req.short_code = Some("spring-sale".into());
        let created = svc.create_tracked(CALLER, &req).unwrap().value;

        assert_eq!(created.short_url, "https://qr.example/r/spring-sale");
        assert_eq!(QRReader::read(&created.qr.bytes).unwrap().data, created.short_url);
        assert!(created.manage_token.starts_with("qrt_"));
        assert_eq!(
            created.manage_url,
            format!("https://qr.example/api/v1/qr/tracked/{}?key={}", created.id, created.manage_token)
        );
        assert_eq!(created.scan_count, 0);

        for agent in ["phone", "tablet"] {
            let meta = ScanMeta { user_agent: Some(agent.into()), referrer: None };
            assert_eq!(svc.redirect("spring-sale", meta).unwrap(), "https://example.com/landing");
        }

        let stats = svc.tracked_stats(&created.id, &created.manage_token).unwrap();
        assert_eq!(stats.scan_count, 2);
        assert_eq!(stats.recent_scans[0].user_agent.as_deref(), Some("tablet"));

        let deleted = svc.delete_tracked(&created.id, &created.manage_token).unwrap();
        assert!(deleted.deleted);
        assert_eq!(svc.redirect("spring-sale", ScanMeta::default()).unwrap_err().status(), 404);
        assert_eq!(svc.tracked_stats(&created.id, &created.manage_token).unwrap_err().status(), 404);
    }

    #[test]
    fn test_tracked_duplicate_code_and_wrong_token() {
        let svc = service();
        let mut req = CreateTrackedRequest::new("https://example.com");
        req.short_code = Some("taken".into());
        let created = svc.create_tracked(CALLER, &req).unwrap().value;

        let err = svc.create_tracked(CALLER, &req).unwrap_err();
        assert_eq!((err.status(), err.code()), (409, "SHORT_CODE_TAKEN"));

        let err = svc.tracked_stats(&created.id, "qrt_00000000000000000000000000000000").unwrap_err();
        assert_eq!(err.status(), 404);
        assert_eq!(svc.delete_tracked(&created.id, "wrong").unwrap_err().status(), 404);
        assert!(svc.tracked_stats(&created.id, &created.manage_token).is_ok());
    }

    #[test]
    fn test_tracked_generated_code_and_expiry() {
        let svc = service();
        let mut req = CreateTrackedRequest::new("https://example.com");
        req.expires_at = Some("2999-01-01T00:00:00Z".into());
        let created = svc.create_tracked(CALLER, &req).unwrap().value;
        assert_eq!(created.short_code.len(), 8);
        assert_eq!(created.expires_at.as_deref(), Some("2999-01-01T00:00:00Z"));
        assert_eq!(svc.purge_expired().unwrap(), 0);

        req.expires_at = Some("2000-01-01T00:00:00Z".into());
        assert_eq!(svc.create_tracked(CALLER, &req).unwrap_err().code(), "INVALID_EXPIRY");
        req.expires_at = None;
        req.target_url = "javascript:alert(1)".into();
        assert_eq!(svc.create_tracked(CALLER, &req).unwrap_err().code(), "INVALID_URL");
    }

    #[test]
    fn test_concurrent_redirects() {
        const THREADS: usize = 8;
        const SCANS: usize = 30;

        let svc = service();
        let created = svc.create_tracked(CALLER, &CreateTrackedRequest::new("https://example.com/hot")).unwrap().value;
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    for _ in 0..SCANS {
                        svc.redirect(&created.short_code, ScanMeta::default()).unwrap();
                    }
                });
            }
        });

        let stats = svc.tracked_stats(&created.id, &created.manage_token).unwrap();
        assert_eq!(stats.scan_count, (THREADS * SCANS) as u64);
        assert_eq!(stats.recent_scans.len(), svc.config().recent_scans_cap.min(THREADS * SCANS));
    }

    #[test]
    fn test_tracked_persists_in_database() {
        let path = std::env::temp_dir().join(format!("qrkit-service-{}.db", std::process::id()));
        let config = Config { database_path: Some(path.clone()), ..Default::default() };

        let created = {
            let svc = QrService::new(config.clone()).unwrap();
            svc.create_tracked(CALLER, &CreateTrackedRequest::new("https://example.com/kept")).unwrap().value
        };

        let svc = QrService::new(config).unwrap();
        assert_eq!(svc.redirect(&created.short_code, ScanMeta::default()).unwrap(), "https://example.com/kept");
        assert_eq!(svc.tracked_stats(&created.id, &created.manage_token).unwrap().scan_count, 1);
        assert!(svc.delete_tracked(&created.id, &created.manage_token).unwrap().deleted);

        drop(svc);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[test]
    fn test_rate_limit() {
        let svc = QrService::new(Config { rate_limit_per_window: 3, ..Default::default() }).unwrap();
        let req = request("limited", |r| r.format = "svg".into());
        let remaining: Vec<_> = (0..3).map(|_| svc.generate(CALLER, &req).unwrap().rate_limit.remaining).collect();
        assert_eq!(remaining, [2, 1, 0]);

        let err = svc.generate(CALLER, &req).unwrap_err();
        let body = err.to_api_error();
        assert_eq!((body.status, body.code.as_str()), (429, "RATE_LIMIT_EXCEEDED"));
        assert_eq!((body.limit, body.remaining), (Some(3), Some(0)));
        assert!(body.retry_after_secs.is_some_and(|s| s <= 60));

        assert!(svc.generate("198.51.100.1", &req).is_ok());
    }
}
