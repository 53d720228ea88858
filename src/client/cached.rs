use crate::domain::{
    Author, BlogPost, Category, Collection, Navigation, Page, SearchHit, SiteConfig, Tag,
};

/// Every value shape a client stores in its cache.
#[derive(Debug, Clone)]
pub enum CachedContent {
    Page(Page),
    Pages(Collection<Page>),
    BlogPost(BlogPost),
    BlogPosts(Collection<BlogPost>),
    Author(Author),
    Authors(Collection<Author>),
    Category(Category),
    Categories(Collection<Category>),
    Tags(Collection<Tag>),
    Navigation(Navigation),
    SiteConfig(SiteConfig),
    Search(Collection<SearchHit>),
}

/// Conversion between a client result and its cache envelope.
pub trait Cacheable: Clone + Sized {
    fn into_cached(self) -> CachedContent;
    fn from_cached(content: CachedContent) -> Option<Self>;
}

macro_rules! cacheable {
    ($($variant:ident => $ty:ty),+ $(,)?) => {
        $(
            impl Cacheable for $ty {
                fn into_cached(self) -> CachedContent {
                    CachedContent::$variant(self)
                }

                fn from_cached(content: CachedContent) -> Option<Self> {
                    match content {
                        CachedContent::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }
        )+
    };
}

cacheable! {
    Page => Page,
    Pages => Collection<Page>,
    BlogPost => BlogPost,
    BlogPosts => Collection<BlogPost>,
    Author => Author,
    Authors => Collection<Author>,
    Category => Category,
    Categories => Collection<Category>,
    Tags => Collection<Tag>,
    Navigation => Navigation,
    SiteConfig => SiteConfig,
    Search => Collection<SearchHit>,
}
