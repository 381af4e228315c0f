// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 目标站点的CSS选择器清单
//!
//! 站点改版时优先检查这里。选择器按使用场景分组，
//! 同一字段的多级回退在 `fields`/`reviews`/`images` 中按序尝试。

// 搜索结果页
pub const RESULT_FEED: &str = "div[role='feed']";
pub const RESULT_LINK: &str = "a.hfpxzc";
pub const SINGLE_RESULT_TITLE: &str = "h1.DUwDvf";
pub const RATING_FILTER_BUTTON: &str = "button[aria-label*='Rating']";

/// 评分过滤菜单项，data-index 由档位映射决定
pub fn rating_menu_item(index: &str) -> String {
    format!("div[role='menuitemradio'][data-index='{}']", index)
}

// 详情页字段
pub const DETAIL_TITLE: &str = "h1.DUwDvf";
pub const AVG_RATING: &str = "div.F7nice span[aria-hidden='true']";
pub const RATING_COUNT: &str = "div.F7nice span[aria-label]";
pub const ADDRESS: &str = "button[data-item-id='address'] div.fontBodyMedium";
pub const WEBSITE: &str = "a[data-item-id='authority']";
pub const PHONE: &str = "button[data-item-id^='phone:tel:'] div.fontBodyMedium";
pub const CATEGORY: &str = "button.DkEaL";
pub const WHEELCHAIR_BADGE: &str = "div.LTs0Rc[aria-label*='Wheelchair']";
pub const CLOSED_NOTICE: &str = "span.fCEvvc";

// 营业时间的三级回退
pub const WORKHOURS_ARIA: &str = "div.t39EBf";
pub const WORKHOURS_TABLE: &str = "table.eK4R0e";
pub const WORKHOURS_TOGGLE: &str = "div.OqCZI";

// 评论视图
pub const REVIEWS_TAB: &str = "button[role='tab'][aria-label*='Reviews']";
pub const MAIN_TAB: &str = "button[role='tab'][aria-label*='Overview']";
pub const REVIEW_SORT_BUTTON: &str = "button[aria-label='Sort reviews']";
pub const REVIEW_SORT_NEWEST: &str = "div[role='menuitemradio'][data-index='1']";
pub const REVIEW_SCROLL_PANE: &str = "div.m6QErb.DxyBCb.kA9KIf.dS8AEf";
pub const REVIEW_BLOCK: &str = "div.jftiEf";
pub const REVIEW_AUTHOR: &str = "div.d4r55";
pub const REVIEW_STARS: &str = "span.kvMYJc";
pub const REVIEW_DATE: &str = "span.rsqaWe";
pub const REVIEW_CONTENT: &str = "span.wiI7pd";
pub const REVIEW_SEE_MORE: &str = "button.w8nwRe";

// 图片画廊
pub const HERO_IMAGE_BUTTON: &str = "button[jsaction*='heroHeaderImage']";
pub const GALLERY_OPEN_FALLBACK: &str = "div.ZKCDEc";
pub const GALLERY_TILE: &str = "a[data-photo-index] div.U39Pmb";
pub const GALLERY_SCROLL_PANE: &str = "div.U26fgb";
pub const SINGLE_IMAGE_MARKER: &str = "div.ofKBgf";

// 挑战页
pub const RECAPTCHA_IFRAME: &str = "iframe[src*='recaptcha']";
pub const RECAPTCHA_CHECKBOX: &str = "#recaptcha-anchor";
