use super::*;

#[test]
fn test_page_request_default() {
    let request = PageRequest::default();
    assert_eq!(request.page, 1);
    assert_eq!(request.per_page, 20);
}

#[test]
fn test_page_request_offset() {
    assert_eq!(PageRequest::new(1, 20).offset(), 0);
    assert_eq!(PageRequest::new(3, 25).offset(), 50);
}

#[test]
fn test_page_request_clamps_bounds() {
    let request = PageRequest::new(0, 1000);
    assert_eq!(request.page, 1);
    assert_eq!(request.per_page, MAX_PER_PAGE);

    assert_eq!(PageRequest::new(2, 0).per_page, 1);
}

#[test]
fn test_total_pages_rounds_up() {
    let response: PageResponse<u8> = PageResponse::new(vec![], 1, 20, 41);
    assert_eq!(response.meta.total_pages, 3);

    let response: PageResponse<u8> = PageResponse::new(vec![], 1, 20, 40);
    assert_eq!(response.meta.total_pages, 2);
}

#[test]
fn test_total_pages_empty_is_one() {
    let response: PageResponse<u8> = PageResponse::new(vec![], 1, 20, 0);
    assert_eq!(response.meta.total_pages, 1);
    assert_eq!(response.meta.total, 0);
}

#[test]
fn test_from_sorted_slices_page() {
    let items: Vec<u32> = (1..=45).collect();
    let page = PageResponse::from_sorted(items, PageRequest::new(3, 20));
    assert_eq!(page.data, vec![41, 42, 43, 44, 45]);
    assert_eq!(page.meta.total, 45);
    assert_eq!(page.meta.total_pages, 3);
}

#[test]
fn test_from_sorted_past_end_is_empty() {
    let items: Vec<u32> = (1..=5).collect();
    let page = PageResponse::from_sorted(items, PageRequest::new(4, 5));
    assert!(page.data.is_empty());
    assert_eq!(page.meta.total, 5);
}
