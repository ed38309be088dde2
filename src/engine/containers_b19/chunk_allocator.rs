use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use crate::Slot;

pub const MAX_NUM_BANKS: usize = 15;
pub const MAX_SIZE: u32 = 1024;
pub const PAGE_SIZE: u32 = 65536;

const ALLOC_SIZE_TABLE: [u32; MAX_NUM_BANKS] =
[
    128,
    192,
    256,
    320,
    384,
    448,
    512,
    576,
    640,
    704,
    768,
    832,
    896,
    960,
    1024,
];

// hash guard stored ahead of each payload in debug builds
#[cfg(debug_assertions)]
const HEADER_SIZE: u32 = 8;
#[cfg(not(debug_assertions))]
const HEADER_SIZE: u32 = 0;

const MAX_PAGES: usize = (u16::MAX - 1) as usize; // Slot-addressable

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError
{
    SizeOutOfRange, // zero, or larger than the largest size class
    PageLimit,      // page index space exhausted
}
impl Display for AllocError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for AllocError { }

// opaque handle to one allocation: page index in the high half, byte offset in the low half
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ChunkRef(u32);
impl ChunkRef
{
    const NONE: u32 = u32::MAX;

    #[inline] #[must_use] const fn new(page: usize, offset: u32) -> Self { Self(((page as u32) << 16) | offset) }
    #[inline] #[must_use] const fn none() -> Self { Self(Self::NONE) }
    #[inline] #[must_use] const fn is_none(self) -> bool { self.0 == Self::NONE }

    #[inline] #[must_use] const fn page(self) -> usize { (self.0 >> 16) as usize }
    #[inline] #[must_use] const fn offset(self) -> u32 { self.0 & 0xFFFF }
}

struct Page
{
    data: Box<[u8]>,
    next: Slot,
    num_chunks: u32,
    max_chunks: u32,
}
impl Page
{
    fn new() -> Self
    {
        Self
        {
            data: vec![0u8; PAGE_SIZE as usize].into_boxed_slice(),
            next: Slot::none(),
            num_chunks: 0,
            max_chunks: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct Bank
{
    top: Slot,           // newest page, the only one bump-allocated from
    free_chunk: ChunkRef,
}

// Fixed-size-class pooled allocator. Chunks are recycled through per-bank free
// lists (the link lives in the free chunk's own bytes); emptied pages go back
// to a page pool, never to the OS until drop. Single-threaded per instance.
pub struct ChunkAllocator
{
    banks: [Bank; MAX_NUM_BANKS],
    pages: Vec<Page>,
    free_pages: Slot,
}
impl ChunkAllocator
{
    #[must_use]
    pub fn new() -> Self
    {
        Self
        {
            banks: [Bank { top: Slot::none(), free_chunk: ChunkRef::none() }; MAX_NUM_BANKS],
            pages: Vec::new(),
            free_pages: Slot::none(),
        }
    }

    #[must_use]
    pub fn calc_bank_index(size: u32) -> usize
    {
        debug_assert!(0 < size && size <= MAX_SIZE);

        let mid = 7;
        let (start, end) = if size < ALLOC_SIZE_TABLE[mid] { (0, mid - 1) } else { (mid, MAX_NUM_BANKS - 1) };
        for i in start..=end
        {
            if size <= ALLOC_SIZE_TABLE[i]
            {
                return i;
            }
        }
        end
    }

    #[must_use]
    pub fn calc_bank_alloc_size(index: usize) -> u32 { ALLOC_SIZE_TABLE[index] }

    #[must_use]
    pub fn calc_alloc_size(size: u32) -> u32 { ALLOC_SIZE_TABLE[Self::calc_bank_index(size)] }

    pub fn allocate(&mut self, size: u32) -> Result<ChunkRef, AllocError>
    {
        if size == 0 || MAX_SIZE < size
        {
            return Err(AllocError::SizeOutOfRange);
        }

        let bank_index = Self::calc_bank_index(size);
        let chunk_size = Self::calc_bank_alloc_size(bank_index);
        let stride = chunk_size + HEADER_SIZE;

        // free chunks first
        let head = self.banks[bank_index].free_chunk;
        if !head.is_none()
        {
            self.banks[bank_index].free_chunk = self.free_next(head);
            #[cfg(debug_assertions)] self.add_check(head, chunk_size);
            return Ok(head);
        }

        let top = self.banks[bank_index].top;
        let page_index = match top.get()
        {
            Some(i) if self.pages[i as usize].num_chunks < self.pages[i as usize].max_chunks => i as usize,
            _ =>
            {
                let index = self.create_page(stride)?;
                self.pages[index].next = top;
                self.banks[bank_index].top = Slot::some(index as u16);
                index
            }
        };

        // bump-allocate the next chunk slot
        let page = &mut self.pages[page_index];
        let offset = page.num_chunks * stride;
        page.num_chunks += 1;

        let chunk = ChunkRef::new(page_index, offset);
        #[cfg(debug_assertions)] self.add_check(chunk, chunk_size);
        Ok(chunk)
    }

    // size must match the allocation's original size class
    pub fn deallocate(&mut self, chunk: ChunkRef, size: u32)
    {
        debug_assert!(0 < size && size <= MAX_SIZE);

        #[cfg(debug_assertions)]
        if !self.verify_check(chunk)
        {
            log::warn!("ChunkAllocator::deallocate: hash check failed at page {} offset {}, dropping chunk", chunk.page(), chunk.offset());
            return;
        }

        let bank_index = Self::calc_bank_index(size);
        let head = self.banks[bank_index].free_chunk;
        self.set_free_next(chunk, head);
        self.banks[bank_index].free_chunk = chunk;
    }

    #[must_use]
    pub fn data(&self, chunk: ChunkRef, size: u32) -> &[u8]
    {
        let chunk_size = Self::calc_alloc_size(size) as usize;
        let start = (chunk.offset() + HEADER_SIZE) as usize;
        &self.pages[chunk.page()].data[start..start + chunk_size]
    }

    #[must_use]
    pub fn data_mut(&mut self, chunk: ChunkRef, size: u32) -> &mut [u8]
    {
        let chunk_size = Self::calc_alloc_size(size) as usize;
        let start = (chunk.offset() + HEADER_SIZE) as usize;
        &mut self.pages[chunk.page()].data[start..start + chunk_size]
    }

    // Return every page whose chunks are all on its bank's free list to the
    // page pool. O(pages x free chunks); an explicit reclaim point, nothing
    // implicit happens during allocate/deallocate.
    pub fn collect_empty_pages(&mut self)
    {
        let mut free_counts = vec![0u32; self.pages.len()];
        for bank in &self.banks
        {
            let mut chunk = bank.free_chunk;
            while !chunk.is_none()
            {
                free_counts[chunk.page()] += 1;
                chunk = self.free_next(chunk);
            }
        }

        let mut empty = vec![false; self.pages.len()];
        for bank_index in 0..MAX_NUM_BANKS
        {
            // unlink fully-free pages from this bank's page list
            let mut any = false;
            let mut prev = Slot::none();
            let mut p = self.banks[bank_index].top;
            while let Some(i) = p.get()
            {
                let pi = i as usize;
                let next = self.pages[pi].next;
                if self.pages[pi].num_chunks > 0 && free_counts[pi] == self.pages[pi].num_chunks
                {
                    match prev.get()
                    {
                        Some(pr) => self.pages[pr as usize].next = next,
                        None => self.banks[bank_index].top = next,
                    }
                    empty[pi] = true;
                    any = true;
                }
                else
                {
                    prev = p;
                }
                p = next;
            }

            if !any
            {
                continue;
            }

            // strip the collected pages' chunks out of the free list
            let mut head = self.banks[bank_index].free_chunk;
            while !head.is_none() && empty[head.page()]
            {
                head = self.free_next(head);
            }
            self.banks[bank_index].free_chunk = head;

            let mut chunk = head;
            while !chunk.is_none()
            {
                let mut next = self.free_next(chunk);
                while !next.is_none() && empty[next.page()]
                {
                    next = self.free_next(next);
                }
                self.set_free_next(chunk, next);
                chunk = next;
            }
        }

        for i in 0..self.pages.len()
        {
            if empty[i]
            {
                self.pages[i].num_chunks = 0;
                self.pages[i].next = self.free_pages;
                self.free_pages = Slot::some(i as u16);
            }
        }
    }

    #[must_use]
    pub fn num_pages(&self) -> usize { self.pages.len() }

    #[must_use]
    pub fn num_pooled_pages(&self) -> usize
    {
        let mut count = 0;
        let mut p = self.free_pages;
        while let Some(i) = p.get()
        {
            count += 1;
            p = self.pages[i as usize].next;
        }
        count
    }

    fn create_page(&mut self, stride: u32) -> Result<usize, AllocError>
    {
        let index = match self.free_pages.get()
        {
            Some(i) =>
            {
                self.free_pages = self.pages[i as usize].next;
                i as usize
            }
            None =>
            {
                if self.pages.len() >= MAX_PAGES
                {
                    return Err(AllocError::PageLimit);
                }
                self.pages.push(Page::new());
                self.pages.len() - 1
            }
        };

        let page = &mut self.pages[index];
        page.next = Slot::none();
        page.max_chunks = PAGE_SIZE / stride;
        page.num_chunks = 0;
        Ok(index)
    }

    // free-list links live in the first bytes of the free chunk's payload
    fn free_next(&self, chunk: ChunkRef) -> ChunkRef
    {
        let start = (chunk.offset() + HEADER_SIZE) as usize;
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.pages[chunk.page()].data[start..start + 4]);
        ChunkRef(u32::from_le_bytes(bytes))
    }

    fn set_free_next(&mut self, chunk: ChunkRef, next: ChunkRef)
    {
        let start = (chunk.offset() + HEADER_SIZE) as usize;
        self.pages[chunk.page()].data[start..start + 4].copy_from_slice(&next.0.to_le_bytes());
    }

    #[cfg(debug_assertions)]
    fn add_check(&mut self, chunk: ChunkRef, chunk_size: u32)
    {
        let start = chunk.offset() as usize;
        let page = &mut self.pages[chunk.page()];
        page.data[start..start + (HEADER_SIZE + chunk_size) as usize].fill(0);
        page.data[start..start + 8].copy_from_slice(&calc_hash(chunk).to_le_bytes());
    }

    #[cfg(debug_assertions)]
    fn verify_check(&self, chunk: ChunkRef) -> bool
    {
        let start = chunk.offset() as usize;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.pages[chunk.page()].data[start..start + 8]);
        u64::from_le_bytes(bytes) == calc_hash(chunk)
    }
}
impl Default for ChunkAllocator
{
    fn default() -> Self { Self::new() }
}

#[cfg(debug_assertions)]
fn calc_hash(chunk: ChunkRef) -> u64
{
    use std::hash::Hasher;

    let mut hasher = metrohash::MetroHash64::default();
    hasher.write_u32(chunk.0);
    hasher.finish()
}
